//! Canonicalizes human names into graph identifiers.
//!
//! `slugify` is a pure function: lowercase, whitespace/underscore runs become
//! a single `-`, everything outside `[a-z0-9-]` is dropped, repeated `-`
//! collapse, leading/trailing `-` are trimmed. An optional parent id is
//! prefixed with `/`. The empty string is a valid output; callers must treat
//! it as an error upstream.

/// Reserved id suffixes only the merge engine may produce.
pub const LEFT_SUFFIX: &str = "::left";
pub const RIGHT_SUFFIX: &str = "::right";

/// Canonicalize a display name into a graph id, optionally nested under a parent.
pub fn slugify(name: &str, parent_id: Option<&str>) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_dash = !slug.is_empty();
            continue;
        }
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash {
                slug.push('-');
                pending_dash = false;
            }
            slug.push(ch);
        }
    }

    match parent_id {
        Some(parent) => format!("{parent}/{slug}"),
        None => slug,
    }
}

/// Whether `id` matches the id grammar: dash-separated lowercase alphanumeric
/// segments, optionally nested with `/`.
pub fn is_valid_id(id: &str) -> bool {
    if id.is_empty() {
        return false;
    }
    id.split('/').all(is_valid_segment)
}

fn is_valid_segment(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    segment.split('-').all(|part| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    })
}

/// Strip a trailing merge suffix, if any. Two nodes collide during merge when
/// their canonical ids are equal.
pub fn canonical_id(id: &str) -> &str {
    id.strip_suffix(LEFT_SUFFIX)
        .or_else(|| id.strip_suffix(RIGHT_SUFFIX))
        .unwrap_or(id)
}

/// The merge suffix carried by `id`, if any ("left" or "right").
pub fn merge_suffix(id: &str) -> Option<&'static str> {
    if id.ends_with(LEFT_SUFFIX) {
        Some("left")
    } else if id.ends_with(RIGHT_SUFFIX) {
        Some("right")
    } else {
        None
    }
}

/// Whether `id` carries a reserved merge suffix. Tool-created ids must not.
pub fn has_merge_suffix(id: &str) -> bool {
    merge_suffix(id).is_some()
}
