mod helpers;

use helpers::{insert_plain_node, test_db};
use megamemory::graph::store::{self, NewNode, NodePatch};
use megamemory::graph::types::{NodeKind, RelationType};

#[test]
fn create_link_query_round_trip() {
    let conn = test_db();

    store::insert_node(
        &conn,
        &NewNode {
            id: "auth".into(),
            name: "Auth".into(),
            kind: NodeKind::Module,
            summary: "Handles JWT validation".into(),
            why: None,
            file_refs: None,
            parent_id: None,
            created_by_task: None,
            embedding: None,
        },
    )
    .unwrap();
    insert_plain_node(&conn, "api", None);
    store::insert_edge(&conn, "api", "auth", RelationType::DependsOn, None).unwrap();

    let outgoing = store::get_outgoing_edges(&conn, "api").unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].edge.to_id, "auth");
    assert_eq!(outgoing[0].neighbor_name, "Auth");

    let incoming = store::get_incoming_edges(&conn, "auth").unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].edge.from_id, "api");
}

#[test]
fn soft_delete_cascades() {
    let conn = test_db();
    insert_plain_node(&conn, "a", None);
    insert_plain_node(&conn, "b", None);
    store::insert_edge(&conn, "a", "b", RelationType::Calls, None).unwrap();

    store::soft_delete_node(&conn, "a", "retired").unwrap();

    assert!(store::get_node(&conn, "a").unwrap().is_none());
    assert!(store::get_outgoing_edges(&conn, "a").unwrap().is_empty());
    assert!(store::get_incoming_edges(&conn, "a").unwrap().is_empty());
    assert!(store::get_node(&conn, "b").unwrap().is_some());

    let removed = store::get_node_including_removed(&conn, "a")
        .unwrap()
        .unwrap();
    assert_eq!(removed.removed_reason.as_deref(), Some("retired"));
}

#[test]
fn every_live_edge_has_live_endpoints() {
    let conn = test_db();
    insert_plain_node(&conn, "a", None);
    insert_plain_node(&conn, "b", None);
    insert_plain_node(&conn, "c", None);
    store::insert_edge(&conn, "a", "b", RelationType::Calls, None).unwrap();
    store::insert_edge(&conn, "b", "c", RelationType::DependsOn, None).unwrap();
    store::soft_delete_node(&conn, "b", "gone").unwrap();

    for edge in store::get_all_edges_raw(&conn).unwrap() {
        assert!(
            store::get_node(&conn, &edge.from_id).unwrap().is_some(),
            "dangling from_id {}",
            edge.from_id
        );
        assert!(
            store::get_node(&conn, &edge.to_id).unwrap().is_some(),
            "dangling to_id {}",
            edge.to_id
        );
    }
}

#[test]
fn parent_child_stays_a_forest() {
    let conn = test_db();
    insert_plain_node(&conn, "root", None);

    let mut mid = NewNode {
        id: "root/mid".into(),
        name: "mid".into(),
        kind: NodeKind::Module,
        summary: "mid".into(),
        why: None,
        file_refs: None,
        parent_id: Some("root".into()),
        created_by_task: None,
        embedding: None,
    };
    store::insert_node(&conn, &mid).unwrap();

    mid.id = "root/mid/leaf".into();
    mid.parent_id = Some("root/mid".into());
    store::insert_node(&conn, &mid).unwrap();

    // root cannot become a descendant of its own subtree
    let err = store::update_node(
        &conn,
        "root",
        &NodePatch {
            parent_id: Some("root/mid/leaf".into()),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), "InvalidParent");

    // every live parent_id resolves to a live node
    for node in store::get_all_nodes_raw(&conn).unwrap() {
        if let Some(parent) = &node.parent_id {
            assert!(store::get_node(&conn, parent).unwrap().is_some());
        }
    }
}

#[test]
fn rename_preserves_edge_triples() {
    let mut conn = test_db();
    insert_plain_node(&conn, "old", None);
    insert_plain_node(&conn, "x", None);
    insert_plain_node(&conn, "y", None);
    store::insert_edge(&conn, "old", "x", RelationType::Calls, Some("c")).unwrap();
    store::insert_edge(&conn, "y", "old", RelationType::Implements, None).unwrap();

    let triples_before: Vec<(String, String, Option<String>)> = {
        let mut v = Vec::new();
        for e in store::get_outgoing_edges(&conn, "old").unwrap() {
            v.push((e.edge.to_id, e.edge.relation.to_string(), e.edge.description));
        }
        for e in store::get_incoming_edges(&conn, "old").unwrap() {
            v.push((e.edge.from_id, e.edge.relation.to_string(), e.edge.description));
        }
        v
    };

    store::rename_node_id(&mut conn, "old", "renamed").unwrap();

    let triples_after: Vec<(String, String, Option<String>)> = {
        let mut v = Vec::new();
        for e in store::get_outgoing_edges(&conn, "renamed").unwrap() {
            v.push((e.edge.to_id, e.edge.relation.to_string(), e.edge.description));
        }
        for e in store::get_incoming_edges(&conn, "renamed").unwrap() {
            v.push((e.edge.from_id, e.edge.relation.to_string(), e.edge.description));
        }
        v
    };

    assert_eq!(triples_before.len(), triples_after.len());
    assert_eq!(triples_before, triples_after);
}

#[test]
fn duplicate_and_invalid_parent_errors() {
    let conn = test_db();
    insert_plain_node(&conn, "taken", None);

    let err = store::insert_node(
        &conn,
        &NewNode {
            id: "taken".into(),
            name: "Taken".into(),
            kind: NodeKind::Feature,
            summary: "s".into(),
            why: None,
            file_refs: None,
            parent_id: None,
            created_by_task: None,
            embedding: None,
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), "Duplicate");

    let err = store::insert_node(
        &conn,
        &NewNode {
            id: "orphan".into(),
            name: "Orphan".into(),
            kind: NodeKind::Feature,
            summary: "s".into(),
            why: None,
            file_refs: None,
            parent_id: Some("ghost".into()),
            created_by_task: None,
            embedding: None,
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), "InvalidParent");
}
