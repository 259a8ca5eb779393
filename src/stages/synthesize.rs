//! Synthesis stage: turn retrieved context into the final report.
//!
//! The report writer is a seam. [`TemplateReportWriter`] is the built-in
//! deterministic implementation; callers wire in their own when they want a
//! model-backed one.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::bucket::{Mode, ResearchItem, ResultBucket, SourceReport};
use crate::error::PipelineError;
use crate::indexing::RetrievalHit;

/// Produces the final report text from the retrieved context.
#[async_trait]
pub trait ReportWriter: Send + Sync {
    async fn write_report(
        &self,
        topic: &str,
        mode: Mode,
        hits: &[RetrievalHit],
    ) -> Result<String, PipelineError>;
}

/// Deterministic report writer that lays the retrieved chunks out as a
/// sectioned markdown digest.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateReportWriter;

#[async_trait]
impl ReportWriter for TemplateReportWriter {
    async fn write_report(
        &self,
        topic: &str,
        mode: Mode,
        hits: &[RetrievalHit],
    ) -> Result<String, PipelineError> {
        let mut report = format!("# Research report: {topic}\n\nMode: {mode}\n");
        if hits.is_empty() {
            report.push_str("\nNo supporting context was retrieved for this topic.\n");
            return Ok(report);
        }
        report.push_str(&format!("\n## Findings ({} sources)\n", hits.len()));
        for (i, hit) in hits.iter().enumerate() {
            let source = hit
                .metadata
                .get("source")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            let collector = hit
                .metadata
                .get("collector")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            report.push_str(&format!(
                "\n### {} [{collector} / {source}]\n{}\n",
                i + 1,
                hit.text
            ));
        }
        Ok(report)
    }
}

/// Run the writer and wrap its report in the final-report bucket shape.
pub async fn synthesize(
    writer: &dyn ReportWriter,
    topic: &str,
    mode: Mode,
    hits: &[RetrievalHit],
) -> Result<ResultBucket, PipelineError> {
    let started = Instant::now();
    let report = writer.write_report(topic, mode, hits).await?;
    Ok(ResultBucket::new()
        .with_source(SourceReport::new(
            "synthesizer",
            vec![ResearchItem {
                title: Some(format!("Research report: {topic}")),
                content: Some(report.clone()),
                ..Default::default()
            }],
        ))
        .with_detail("report_chars", json!(report.len()))
        .with_detail("context_chunks", json!(hits.len()))
        .with_elapsed(started.elapsed()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(text: &str, source: &str, collector: &str) -> RetrievalHit {
        RetrievalHit {
            text: text.to_string(),
            metadata: json!({"source": source, "collector": collector}),
        }
    }

    #[tokio::test]
    async fn template_report_cites_every_hit() {
        let hits = vec![
            hit("qubits decohere fast", "arxiv", "academic"),
            hit("funding rose in Q2", "newsapi", "news"),
        ];
        let report = TemplateReportWriter
            .write_report("quantum computing", Mode::Extended, &hits)
            .await
            .unwrap();
        assert!(report.contains("# Research report: quantum computing"));
        assert!(report.contains("qubits decohere fast"));
        assert!(report.contains("[news / newsapi]"));
    }

    #[tokio::test]
    async fn no_context_is_stated_not_hidden() {
        let report = TemplateReportWriter
            .write_report("anything", Mode::Simple, &[])
            .await
            .unwrap();
        assert!(report.contains("No supporting context"));
    }

    #[tokio::test]
    async fn synthesize_wraps_report_in_bucket() {
        let hits = vec![hit("a finding", "tavily", "web")];
        let bucket = synthesize(&TemplateReportWriter, "topic", Mode::Simple, &hits)
            .await
            .unwrap();
        assert_eq!(bucket.sources[0].name, "synthesizer");
        let item = &bucket.sources[0].items[0];
        assert!(item.content.as_deref().unwrap().contains("a finding"));
        assert_eq!(bucket.details["context_chunks"], json!(1));
    }
}
