use crate::client::VendorApi;
use crate::error::{PipelineError, Result};
use crate::extractor::Extractor;
use crate::llm::{AnomalyDetector, CompletionService, FinancialAnalysisAgent};
use crate::model::{AnalysisReport, AnomalyFinding, InvoiceDataset, InvoiceType};
use chrono::NaiveDate;
use log::info;

/// Result of a detection run over the session's current snapshot.
#[derive(Debug, Clone)]
pub enum DetectionOutcome {
    /// The dataset was empty; the detector was not invoked and the dashboard
    /// should show "no data".
    NoData,
    Findings(Vec<AnomalyFinding>),
}

/// Explicit per-session context for one dashboard session.
///
/// Owns the current dataset snapshot and the findings derived from it, so
/// concurrent sessions stay isolated. Rebuilding the snapshot discards the
/// findings: a finding's `record_index` only resolves within the snapshot it
/// was derived from.
pub struct AnalysisSession<A, C> {
    extractor: Extractor<A>,
    detector: AnomalyDetector<C>,
    analyst: FinancialAnalysisAgent<C>,
    dataset: Option<InvoiceDataset>,
    findings: Vec<AnomalyFinding>,
}

impl<A, C> AnalysisSession<A, C>
where
    A: VendorApi,
    C: CompletionService,
{
    pub fn new(
        extractor: Extractor<A>,
        detector: AnomalyDetector<C>,
        analyst: FinancialAnalysisAgent<C>,
    ) -> Self {
        Self {
            extractor,
            detector,
            analyst,
            dataset: None,
            findings: Vec::new(),
        }
    }

    /// Rebuild the snapshot for a new date range / type selection. Always
    /// replaces the dataset and discards stale findings, even on failure.
    pub async fn load(
        &mut self,
        link_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        type_filter: InvoiceType,
    ) -> Result<&InvoiceDataset> {
        self.dataset = None;
        self.findings.clear();

        let dataset = self
            .extractor
            .extract(link_id, start_date, end_date, type_filter)
            .await?;
        info!("Session loaded {} records", dataset.len());
        Ok(self.dataset.insert(dataset))
    }

    pub fn dataset(&self) -> Option<&InvoiceDataset> {
        self.dataset.as_ref()
    }

    pub fn findings(&self) -> &[AnomalyFinding] {
        &self.findings
    }

    /// Run detection over the current snapshot. An empty snapshot
    /// short-circuits to `NoData` without a completion request.
    pub async fn detect(&mut self) -> Result<DetectionOutcome> {
        let dataset = self.dataset.as_ref().ok_or_else(|| {
            PipelineError::Validation("no dataset loaded; call load first".to_string())
        })?;

        if dataset.is_empty() {
            self.findings.clear();
            return Ok(DetectionOutcome::NoData);
        }

        let findings = self.detector.detect(dataset).await?;
        self.findings = findings.clone();
        Ok(DetectionOutcome::Findings(findings))
    }

    /// Analyze the `selection`-th finding of the last detection run.
    pub async fn analyze(&self, selection: usize) -> Result<AnalysisReport> {
        let dataset = self.dataset.as_ref().ok_or_else(|| {
            PipelineError::Validation("no dataset loaded; call load first".to_string())
        })?;

        let finding = self
            .findings
            .get(selection)
            .ok_or(PipelineError::StaleFinding {
                index: selection,
                len: self.findings.len(),
            })?;

        self.analyst.analyze(dataset, finding).await
    }
}
