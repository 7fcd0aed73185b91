use crate::error::{PipelineError, Result};
use crate::llm::client::CompletionService;
use crate::llm::detector::render_invoice_table;
use crate::llm::prompts::SYSTEM_PROMPT_SUMMARY;
use crate::llm::request_structured;
use crate::model::{AnomalyFinding, InvoiceDataset};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Free-text envelope for requests whose answer is prose rather than data.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MarkdownResponse {
    #[schemars(description = "The full report as markdown")]
    pub markdown: String,
}

/// Neighboring records included on each side of a flagged one. The prompt
/// carries only the flagged records and these windows, never the whole
/// dataset, so its size is bounded by the finding count.
const SUMMARY_CONTEXT_RADIUS: usize = 3;

/// Turns a session's findings into one markdown report.
pub struct Summarizer<C> {
    client: C,
}

impl<C: CompletionService> Summarizer<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Every finding must resolve within `dataset`.
    pub async fn summarize(
        &self,
        dataset: &InvoiceDataset,
        findings: &[AnomalyFinding],
    ) -> Result<String> {
        for finding in findings {
            if finding.record_index >= dataset.len() {
                return Err(PipelineError::StaleFinding {
                    index: finding.record_index,
                    len: dataset.len(),
                });
            }
        }

        let mut user = String::from("Anomalies:\n\n");
        for finding in findings {
            let record = &dataset.records()[finding.record_index];
            let _ = writeln!(
                user,
                "- index {}: {} for {:.2} ({:?}): {}",
                finding.record_index,
                record.issue_date,
                record.amount,
                finding.severity,
                finding.reason
            );
        }
        for finding in findings {
            let window_start = finding.record_index.saturating_sub(SUMMARY_CONTEXT_RADIUS);
            let window = dataset.context_window(finding.record_index, SUMMARY_CONTEXT_RADIUS);
            let _ = write!(
                user,
                "\nContext around index {}:\n\n{}",
                finding.record_index,
                render_invoice_table(window, window_start)
            );
        }

        let response: MarkdownResponse =
            request_structured(&self.client, SYSTEM_PROMPT_SUMMARY, &user).await?;
        Ok(response.markdown)
    }
}
