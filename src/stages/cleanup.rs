//! Cleanup stage: clear the previous run's archive files and reset the
//! vector store before new results land.

use std::path::Path;
use std::time::Instant;

use serde_json::json;
use tracing::{debug, warn};

use crate::bucket::{ResearchItem, ResultBucket, SourceReport};
use crate::indexing::SqliteIndexStore;

/// Remove archived `.json` snapshots from `archive_dir` and empty the index
/// store. Filesystem and store failures are recorded in the report bucket;
/// the run proceeds against whatever state remains.
pub async fn cleanup(archive_dir: &Path, store: Option<&SqliteIndexStore>) -> ResultBucket {
    let started = Instant::now();
    let mut removed: Vec<String> = Vec::new();
    let mut errors: Vec<String> = Vec::new();

    match tokio::fs::read_dir(archive_dir).await {
        Ok(mut entries) => loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if !name.ends_with(".json") {
                        continue;
                    }
                    match tokio::fs::remove_file(entry.path()).await {
                        Ok(()) => removed.push(name),
                        Err(err) => errors.push(format!("{name}: {err}")),
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    errors.push(format!("archive listing: {err}"));
                    break;
                }
            }
        },
        // A missing directory just means there is nothing to remove.
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => errors.push(format!("archive dir: {err}")),
    }

    let mut vector_store_cleared = false;
    if let Some(store) = store {
        match store.clear().await {
            Ok(deleted) => {
                vector_store_cleared = true;
                debug!(deleted, "cleared vector store");
            }
            Err(err) => errors.push(format!("vector store: {err}")),
        }
    }

    if !errors.is_empty() {
        warn!(?errors, "cleanup finished with errors");
    }

    let items = removed
        .iter()
        .map(|name| ResearchItem::from_text(name.clone()))
        .collect();
    let mut source = SourceReport::new("cleanup", items)
        .with_metadata("directory", json!(archive_dir.display().to_string()))
        .with_metadata("removed_count", json!(removed.len()))
        .with_metadata("vector_store_cleared", json!(vector_store_cleared));
    if !errors.is_empty() {
        source = source.with_metadata("errors", json!(errors));
    }

    ResultBucket::new()
        .with_source(source)
        .with_detail(
            "note",
            json!("Removed archives and reset vector store before new run"),
        )
        .with_elapsed(started.elapsed())
}
