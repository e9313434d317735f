mod helpers;

use helpers::{test_db, StubEmbedder};
use megamemory::graph::store::{self, NewNode};
use megamemory::graph::types::{NodeKind, RelationType};
use megamemory::merge::merge_connections;
use megamemory::merge::resolve::{resolve_keep, KeepChoice};
use megamemory::tools::resolve_conflict::{self, ResolveConflictParams, ResolvedFields};
use rusqlite::Connection;

fn put(conn: &Connection, id: &str, summary: &str) {
    store::insert_node(
        conn,
        &NewNode {
            id: id.into(),
            name: id.into(),
            kind: NodeKind::Feature,
            summary: summary.into(),
            why: None,
            file_refs: None,
            parent_id: None,
            created_by_task: None,
            embedding: None,
        },
    )
    .unwrap();
}

/// Merge a one-concept disagreement and return (output store, merge group).
fn conflicted_store() -> (Connection, String) {
    let left = test_db();
    let right = test_db();
    put(&left, "feature-x", "L");
    put(&right, "feature-x", "R");
    // A clean caller on both sides linking to the disputed concept.
    put(&left, "caller", "calls feature-x");
    put(&right, "caller", "calls feature-x");
    store::insert_edge(&left, "caller", "feature-x", RelationType::Calls, None).unwrap();
    store::insert_edge(&right, "caller", "feature-x", RelationType::Calls, None).unwrap();

    let out = test_db();
    let report = merge_connections(&left, &right, &out, "left", "right").unwrap();
    assert_eq!(report.concept_conflicts, 1);
    let group = report.merge_groups[0].clone();
    (out, group)
}

#[test]
fn resolve_conflict_tool_keeps_left_and_applies_patch() {
    let (mut conn, group) = conflicted_store();
    let embedder = StubEmbedder::new();

    let result = resolve_conflict::run(
        &mut conn,
        &embedder,
        &ResolveConflictParams {
            merge_group: group.clone(),
            resolved: ResolvedFields {
                summary: "final".into(),
                why: None,
                file_refs: None,
            },
            reason: "verified".into(),
        },
    )
    .unwrap();
    assert_eq!(result.id, "feature-x");

    let node = store::get_node(&conn, "feature-x").unwrap().unwrap();
    assert_eq!(node.summary, "final");
    assert!(!node.needs_merge);
    assert!(node.merge_group.is_none());
    assert!(node.source_branch.is_none());
    assert!(node.embedding.is_some(), "embedding regenerated on resolve");
    // The winner was the ::left variant
    assert_eq!(node.name, "feature-x");

    assert!(store::get_node_including_removed(&conn, "feature-x::left")
        .unwrap()
        .is_none());
    assert!(store::get_node_including_removed(&conn, "feature-x::right")
        .unwrap()
        .is_none());

    // Edges formerly pointing at feature-x::left now reach feature-x
    let incoming = store::get_incoming_edges(&conn, "feature-x").unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].edge.from_id, "caller");
    assert!(!incoming[0].edge.needs_merge);
}

#[test]
fn resolve_conflict_prefers_live_over_removed() {
    let left = test_db();
    let right = test_db();
    put(&left, "contested", "the concept");
    put(&right, "contested", "the concept");
    store::soft_delete_node(&left, "contested", "left dropped it").unwrap();

    let mut out = test_db();
    let report = merge_connections(&left, &right, &out, "left", "right").unwrap();
    let group = report.merge_groups[0].clone();

    let embedder = StubEmbedder::new();
    let result = resolve_conflict::run(
        &mut out,
        &embedder,
        &ResolveConflictParams {
            merge_group: group,
            resolved: ResolvedFields {
                summary: "kept alive".into(),
                why: None,
                file_refs: None,
            },
            reason: "the removal was premature".into(),
        },
    )
    .unwrap();

    assert_eq!(result.id, "contested");
    let node = store::get_node(&out, "contested").unwrap().unwrap();
    assert!(node.removed_at.is_none(), "live side won");
    assert_eq!(node.summary, "kept alive");
}

#[test]
fn resolve_unknown_group_is_not_found() {
    let mut conn = test_db();
    let embedder = StubEmbedder::new();
    let err = resolve_conflict::run(
        &mut conn,
        &embedder,
        &ResolveConflictParams {
            merge_group: "no-such-group".into(),
            resolved: ResolvedFields {
                summary: "x".into(),
                why: None,
                file_refs: None,
            },
            reason: "r".into(),
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), "NotFound");
}

#[test]
fn cli_keep_right_discards_left() {
    let (mut conn, group) = conflicted_store();

    let kept = resolve_keep(&mut conn, &group, KeepChoice::Right).unwrap();
    assert_eq!(kept, vec!["feature-x".to_string()]);

    let node = store::get_node(&conn, "feature-x").unwrap().unwrap();
    assert_eq!(node.summary, "R");
    assert!(!node.needs_merge);
    assert!(store::get_node_including_removed(&conn, "feature-x::left")
        .unwrap()
        .is_none());
}

#[test]
fn cli_keep_both_renames_by_branch() {
    let (mut conn, group) = conflicted_store();

    let mut kept = resolve_keep(&mut conn, &group, KeepChoice::Both).unwrap();
    kept.sort();
    assert_eq!(
        kept,
        vec!["feature-x-left".to_string(), "feature-x-right".to_string()]
    );

    for id in &kept {
        let node = store::get_node(&conn, id).unwrap().unwrap();
        assert!(!node.needs_merge);
        assert!(node.merge_group.is_none());
    }

    // The caller's edge (deduped to the left variant at merge time) followed
    // the rename.
    let outgoing = store::get_outgoing_edges(&conn, "caller").unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].edge.to_id, "feature-x-left");
}

#[test]
fn keep_left_after_keep_left_fails_not_found() {
    let (mut conn, group) = conflicted_store();
    resolve_keep(&mut conn, &group, KeepChoice::Left).unwrap();

    let err = resolve_keep(&mut conn, &group, KeepChoice::Left).unwrap_err();
    assert_eq!(err.kind(), "NotFound");
}
