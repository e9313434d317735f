use anyhow::Result;

use crate::config::resolve_db_path;
use crate::db;
use crate::graph::store;
use crate::graph::types::NodeKind;

/// Display graph statistics in the terminal.
pub fn stats(db_flag: Option<&str>) -> Result<()> {
    let db_path = resolve_db_path(db_flag);
    let conn = db::open_database(&db_path)?;

    let stats = store::get_stats(&conn)?;
    let kinds = store::get_kinds_breakdown(&conn)?;
    let conflicts = store::get_conflict_nodes(&conn)?;

    println!("Knowledge Graph Statistics");
    println!("{}", "=".repeat(40));
    println!("  Store:               {}", db_path.display());
    println!("  Live concepts:       {}", stats.nodes);
    println!("  Edges:               {}", stats.edges);
    println!("  Removed concepts:    {}", stats.removed);
    println!();

    println!("By Kind:");
    for kind in NodeKind::ALL {
        let count = kinds.get(kind.as_str()).copied().unwrap_or(0);
        println!("  {:<12} {}", kind.as_str(), count);
    }

    if !conflicts.is_empty() {
        println!();
        println!(
            "Warning: {} concept(s) awaiting conflict resolution — run `megamemory conflicts`.",
            conflicts.len()
        );
    }

    Ok(())
}
