use anyhow::{bail, Result};

use crate::config::resolve_db_path;
use crate::db;
use crate::merge::resolve::{resolve_keep, KeepChoice};

/// Resolve one conflict group by keeping left, right, or both variants.
/// `--keep` is validated here rather than by the argument parser so misuse
/// exits 1, not 2.
pub fn resolve(merge_group: &str, keep: Option<&str>, db_flag: Option<&str>) -> Result<()> {
    let Some(keep) = keep else {
        bail!("--keep is required: left, right, or both");
    };
    let choice: KeepChoice = match keep.parse() {
        Ok(c) => c,
        Err(e) => bail!("{e}"),
    };

    let db_path = resolve_db_path(db_flag);
    let mut conn = db::open_database(&db_path)?;

    let kept = resolve_keep(&mut conn, merge_group, choice)?;

    match kept.len() {
        1 => println!("Resolved {merge_group}: kept {}", kept[0]),
        _ => println!("Resolved {merge_group}: kept {}", kept.join(", ")),
    }

    Ok(())
}
