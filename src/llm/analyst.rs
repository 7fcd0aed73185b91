use crate::error::{PipelineError, Result};
use crate::llm::client::CompletionService;
use crate::llm::detector::render_invoice_table;
use crate::llm::prompts::SYSTEM_PROMPT_ANALYSIS;
use crate::llm::request_structured;
use crate::model::{AnalysisReport, AnalysisResponse, AnomalyFinding, InvoiceDataset};
use log::info;

const DEFAULT_CONTEXT_RADIUS: usize = 3;

/// Produces a narrative and recommendations for one selected anomaly.
pub struct FinancialAnalysisAgent<C> {
    client: C,
    context_radius: usize,
}

impl<C: CompletionService> FinancialAnalysisAgent<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            context_radius: DEFAULT_CONTEXT_RADIUS,
        }
    }

    /// Neighboring records included on each side of the anomalous one.
    pub fn with_context_radius(mut self, radius: usize) -> Self {
        self.context_radius = radius;
        self
    }

    /// The finding must resolve within `dataset`; a stale reference fails
    /// before any external request is issued.
    pub async fn analyze(
        &self,
        dataset: &InvoiceDataset,
        finding: &AnomalyFinding,
    ) -> Result<AnalysisReport> {
        let record = dataset
            .get(finding.record_index)
            .ok_or(PipelineError::StaleFinding {
                index: finding.record_index,
                len: dataset.len(),
            })?;

        let window_start = finding.record_index.saturating_sub(self.context_radius);
        let window = dataset.context_window(finding.record_index, self.context_radius);

        let user = format!(
            "Flagged invoice (index {}):\n\
             - date: {}\n\
             - amount: {:.2}\n\
             - type: {}\n\
             - counterparty: {}\n\
             - detector reason: {}\n\
             - severity: {:?}\n\n\
             Context window:\n\n{}",
            finding.record_index,
            record.issue_date,
            record.amount,
            record.invoice_type,
            record.counterparty.as_deref().unwrap_or("-"),
            finding.reason,
            finding.severity,
            render_invoice_table(window, window_start),
        );

        let response: AnalysisResponse =
            request_structured(&self.client, SYSTEM_PROMPT_ANALYSIS, &user).await?;

        info!(
            "Analysis finished for record {} ({} recommendations)",
            finding.record_index,
            response.recommendations.len()
        );

        Ok(AnalysisReport {
            record_index: finding.record_index,
            narrative: response.narrative,
            recommendations: response.recommendations,
        })
    }
}
