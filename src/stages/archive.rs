//! Archive stage: persist a JSON snapshot of the run before indexing.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::bucket::{Mode, ResearchItem, ResultBucket, SourceReport};
use crate::error::PipelineError;
use crate::state::RunState;

/// Turn a topic into a filesystem-safe slug: lowercase, runs of anything
/// non-alphanumeric collapse to single underscores.
pub fn slugify(topic: &str) -> String {
    let mut slug = String::with_capacity(topic.len());
    let mut last_was_sep = true;
    for ch in topic.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// Write the full run state, topic, and mode to
/// `<dir>/<UTC timestamp>_<topic slug>.json` and return a report bucket
/// naming the file.
pub async fn archive(
    state: &RunState,
    topic: &str,
    mode: Mode,
    run_id: &str,
    dir: &Path,
) -> Result<ResultBucket, PipelineError> {
    let started = Instant::now();
    let timestamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    let filename = format!("{timestamp}_{}.json", slugify(topic));
    let path: PathBuf = dir.join(&filename);

    let snapshot = json!({
        "run_id": run_id,
        "topic": topic,
        "mode": mode,
        "archived_at": Utc::now().to_rfc3339(),
        "state": state,
    });
    let body = serde_json::to_vec_pretty(&snapshot)?;

    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&path, body).await?;
    info!(path = %path.display(), "archived run snapshot");

    Ok(ResultBucket::new()
        .with_source(SourceReport::new(
            "archiver",
            vec![ResearchItem::from_text(format!("Archived run to {filename}"))],
        ))
        .with_detail("path", json!(path.display().to_string()))
        .with_detail("bucket_count", json!(state.len()))
        .with_elapsed(started.elapsed()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_collapses() {
        assert_eq!(slugify("Quantum Computing!"), "quantum_computing");
        assert_eq!(slugify("  A -- B  "), "a_b");
        assert_eq!(slugify("***"), "untitled");
        assert_eq!(slugify(""), "untitled");
    }

    #[tokio::test]
    async fn archive_writes_a_readable_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = RunState::new();
        state
            .put(
                "web_results",
                ResultBucket::new().with_source(SourceReport::new(
                    "tavily",
                    vec![ResearchItem::from_text("a finding")],
                )),
            )
            .unwrap();

        let bucket = archive(&state, "Quantum Computing", Mode::Simple, "run-1", dir.path())
            .await
            .unwrap();
        assert!(!bucket.has_error());

        let path = bucket.details["path"].as_str().unwrap();
        assert!(path.ends_with("_quantum_computing.json"));
        let raw = std::fs::read_to_string(path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["topic"], json!("Quantum Computing"));
        assert_eq!(parsed["mode"], json!("simple"));
        assert!(parsed["state"]["web_results"].is_object());
    }
}
