use anyhow::Result;

use crate::config::resolve_db_path;
use crate::db;
use crate::tools::list_conflicts;

/// List unresolved merge conflicts. Exit code is 0 whether or not conflicts
/// exist; scripts should parse the `--json` output.
pub fn conflicts(db_flag: Option<&str>, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_flag);
    let conn = db::open_database(&db_path)?;

    let response = list_conflicts::run(&conn)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if response.groups.is_empty() {
        println!("No unresolved conflicts.");
        return Ok(());
    }

    println!(
        "{} unresolved conflict group(s) in {}",
        response.total,
        db_path.display()
    );
    for group in &response.groups {
        println!();
        println!("Group {}", group.merge_group);
        if let Some(ts) = &group.merge_timestamp {
            println!("  merged at: {ts}");
        }
        for version in &group.versions {
            let branch = version.source_branch.as_deref().unwrap_or("?");
            let state = if version.removed_at.is_some() {
                " (removed)"
            } else {
                ""
            };
            println!("  [{branch}] {}{state}", version.id);
            println!("      {} | {}", version.kind, version.summary);
            if let Some(refs) = &version.file_refs {
                println!("      files: {}", refs.join(", "));
            }
        }
    }

    Ok(())
}
