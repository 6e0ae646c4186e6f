//! Persisting the inventory.

use crate::record::VideoRecord;
use eyre::Context;
use std::path::Path;

/// Writes `records` to `path` as a pretty-printed JSON array, creating parent directories as
/// needed. An existing file is replaced.
pub async fn write_records(path: &Path, records: &[VideoRecord]) -> eyre::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create output directory {}", parent.display()))?;
    }

    let mut json = serde_json::to_vec_pretty(records).context("serialize video records")?;
    json.push(b'\n');
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("write {}", path.display()))?;

    tracing::info!(path = %path.display(), count = records.len(), "wrote inventory");
    Ok(())
}
