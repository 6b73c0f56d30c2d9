pub mod chunks;
pub mod sessions;
pub mod workflows;

use std::path::Path;

use serde::Serialize;

use crate::error::Result;

/// Atomically persist a table to disk (temp file + rename) so readers
/// never observe a torn file.
fn save_atomic<T: Serialize>(path: &Path, rows: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string(rows)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
