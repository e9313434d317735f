use std::path::Path;

use anyhow::Result;

use crate::merge::merge_files;

/// Merge two graph files. Without `--into`, `file1` is overwritten in place
/// (via a temp sibling and atomic rename).
pub fn merge(
    file1: &str,
    file2: &str,
    into: Option<&str>,
    left_label: &str,
    right_label: &str,
) -> Result<()> {
    let report = merge_files(
        Path::new(file1),
        Path::new(file2),
        into.map(Path::new),
        left_label,
        right_label,
    )?;

    let out = into.unwrap_or(file1);
    println!("Merged {file1} + {file2} -> {out}");
    println!("{}", "=".repeat(40));
    println!("  Clean concepts:      {}", report.clean);
    println!("  Removed (agreed):    {}", report.removed_clean);
    println!("  Concept conflicts:   {}", report.concept_conflicts);
    println!("  Edge conflicts:      {}", report.edge_conflicts);

    if report.concept_conflicts > 0 {
        println!();
        println!(
            "Run `megamemory conflicts --db {out}` to inspect, then \
             `megamemory resolve <merge_group> --keep left|right|both`."
        );
    }

    Ok(())
}
