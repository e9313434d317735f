//! Core graph type definitions.
//!
//! Defines [`NodeKind`] (the six concept categories), [`RelationType`] (the
//! five edge categories), and the record structs matching the `nodes`,
//! `edges`, and `timeline` tables.

use serde::{Deserialize, Serialize};

use crate::error::KnowledgeError;

/// The semantic category of a concept node. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// User-visible capability or behavior.
    Feature,
    /// A code module or subsystem.
    Module,
    /// A recurring implementation pattern or convention.
    Pattern,
    /// Configuration, tunables, environment wiring.
    Config,
    /// A recorded decision and its rationale.
    Decision,
    /// A deployable or structural component.
    Component,
}

impl NodeKind {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Module => "module",
            Self::Pattern => "pattern",
            Self::Config => "config",
            Self::Decision => "decision",
            Self::Component => "component",
        }
    }

    /// All kinds, in display order.
    pub const ALL: [NodeKind; 6] = [
        Self::Feature,
        Self::Module,
        Self::Pattern,
        Self::Config,
        Self::Decision,
        Self::Component,
    ];
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feature" => Ok(Self::Feature),
            "module" => Ok(Self::Module),
            "pattern" => Ok(Self::Pattern),
            "config" => Ok(Self::Config),
            "decision" => Ok(Self::Decision),
            "component" => Ok(Self::Component),
            _ => Err(format!("unknown node kind: {s}")),
        }
    }
}

impl NodeKind {
    /// Parse a kind read back from the store. An unknown string means the
    /// store is corrupt, not that the caller made a bad request.
    pub fn from_stored(s: &str) -> Result<Self, KnowledgeError> {
        s.parse()
            .map_err(|_| KnowledgeError::InvariantViolation(format!("unknown node kind in store: {s}")))
    }
}

/// The semantic category of an edge. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    ConnectsTo,
    DependsOn,
    Implements,
    Calls,
    ConfiguredBy,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectsTo => "connects_to",
            Self::DependsOn => "depends_on",
            Self::Implements => "implements",
            Self::Calls => "calls",
            Self::ConfiguredBy => "configured_by",
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connects_to" => Ok(Self::ConnectsTo),
            "depends_on" => Ok(Self::DependsOn),
            "implements" => Ok(Self::Implements),
            "calls" => Ok(Self::Calls),
            "configured_by" => Ok(Self::ConfiguredBy),
            _ => Err(format!("unknown relation type: {s}")),
        }
    }
}

impl RelationType {
    pub fn from_stored(s: &str) -> Result<Self, KnowledgeError> {
        s.parse().map_err(|_| {
            KnowledgeError::InvariantViolation(format!("unknown relation type in store: {s}"))
        })
    }
}

/// A concept node, matching the `nodes` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Lowercase slug, optionally nested as `parent/child`.
    pub id: String,
    /// Human display name.
    pub name: String,
    pub kind: NodeKind,
    /// Non-empty free text describing the concept.
    pub summary: String,
    /// Optional rationale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
    /// Ordered file path references, each possibly with a line range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_refs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_task: Option<String>,
    /// UTC timestamp, second resolution.
    pub created_at: String,
    pub updated_at: String,
    /// Set on soft delete; live nodes have both null.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_reason: Option<String>,
    /// Unit-normalized float32[384], or `None` if not yet computed.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_group: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub needs_merge: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_timestamp: Option<String>,
}

impl Node {
    /// A node is live when it has not been soft-deleted.
    pub fn is_live(&self) -> bool {
        self.removed_at.is_none()
    }
}

/// A typed directed relationship, matching the `edges` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: i64,
    pub from_id: String,
    pub to_id: String,
    pub relation: RelationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_group: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub needs_merge: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_timestamp: Option<String>,
}

impl Edge {
    /// Content identity key used for deduplication across merges. Edge ids
    /// are store-local and excluded.
    pub fn content_key(&self) -> (String, String, &'static str, Option<String>) {
        (
            self.from_id.clone(),
            self.to_id.clone(),
            self.relation.as_str(),
            self.description.clone(),
        )
    }
}

/// One append-only audit record, matching the `timeline` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub seq: i64,
    pub timestamp: String,
    pub tool: String,
    /// Opaque JSON string of the tool's parameters.
    pub params: String,
    pub result_summary: String,
    pub is_write: bool,
    pub is_error: bool,
    /// Node ids the tool created, updated, removed, or linked.
    pub affected_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_kind_round_trips_through_strings() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.as_str().parse::<NodeKind>().unwrap(), kind);
        }
    }

    #[test]
    fn relation_type_round_trips_through_strings() {
        for s in [
            "connects_to",
            "depends_on",
            "implements",
            "calls",
            "configured_by",
        ] {
            assert_eq!(s.parse::<RelationType>().unwrap().as_str(), s);
        }
    }

    #[test]
    fn unknown_stored_kind_is_invariant_violation() {
        let err = NodeKind::from_stored("widget").unwrap_err();
        assert_eq!(err.kind(), "InvariantViolation");
    }

    #[test]
    fn unknown_request_kind_is_plain_parse_error() {
        assert!("widget".parse::<NodeKind>().is_err());
    }
}
