use crate::error::{PipelineError, Result};
use crate::llm::client::CompletionService;
use crate::llm::prompts::SYSTEM_PROMPT_DETECTION;
use crate::llm::request_structured;
use crate::model::{AnomalyFinding, DetectionResponse, InvoiceDataset, InvoiceRecord};
use log::info;
use std::fmt::Write;

/// Upper bound on the rows serialized into a detection prompt. Larger datasets
/// are rejected instead of truncated: a silently clipped table would make the
/// model score partial data.
pub const MAX_DETECTION_ROWS: usize = 1000;

/// Scores a dataset snapshot for anomalous amounts via the completion service.
pub struct AnomalyDetector<C> {
    client: C,
}

impl<C: CompletionService> AnomalyDetector<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Returns every anomaly the model finds, or an empty list when the data
    /// looks normal. Findings referencing rows outside the snapshot are
    /// treated as malformed output.
    pub async fn detect(&self, dataset: &InvoiceDataset) -> Result<Vec<AnomalyFinding>> {
        if dataset.len() > MAX_DETECTION_ROWS {
            return Err(PipelineError::Validation(format!(
                "dataset has {} records, detection is bounded to {}; narrow the date range",
                dataset.len(),
                MAX_DETECTION_ROWS
            )));
        }

        let table = render_invoice_table(dataset.records(), 0);
        let user = format!("Data:\n\n{}", table);

        let response: DetectionResponse =
            request_structured(&self.client, SYSTEM_PROMPT_DETECTION, &user).await?;

        for finding in &response.anomalies {
            if finding.record_index >= dataset.len() {
                return Err(PipelineError::ModelResponse(format!(
                    "finding references record {} but the dataset has {} records",
                    finding.record_index,
                    dataset.len()
                )));
            }
        }

        info!(
            "Detection finished: {} findings over {} records",
            response.anomalies.len(),
            dataset.len()
        );
        Ok(response.anomalies)
    }
}

/// Markdown table of records, indexed from `first_index` so findings can
/// reference rows positionally.
pub(crate) fn render_invoice_table(records: &[InvoiceRecord], first_index: usize) -> String {
    let mut table = String::from("| index | date | amount | type | counterparty |\n");
    table.push_str("|---|---|---|---|---|\n");
    for (offset, record) in records.iter().enumerate() {
        let _ = writeln!(
            table,
            "| {} | {} | {:.2} | {} | {} |",
            first_index + offset,
            record.issue_date,
            record.amount,
            record.invoice_type,
            record.counterparty.as_deref().unwrap_or("-"),
        );
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::CompletionRequest;
    use crate::model::InvoiceType;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    /// Returns canned completions in order and counts the calls made.
    struct ScriptedCompletions {
        responses: Mutex<Vec<Result<String>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedCompletions {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl CompletionService for ScriptedCompletions {
        async fn complete(&self, _request: CompletionRequest<'_>) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn dataset(amounts: &[f64]) -> InvoiceDataset {
        let records = amounts
            .iter()
            .enumerate()
            .map(|(i, &amount)| InvoiceRecord {
                id: format!("inv-{}", i),
                issue_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Days::new(i as u64),
                amount,
                invoice_type: InvoiceType::Inflow,
                counterparty: None,
                raw_fields: serde_json::Map::new(),
            })
            .collect();
        InvoiceDataset::from_records(records)
    }

    #[tokio::test]
    async fn test_no_anomalies_is_empty_not_error() {
        let client = ScriptedCompletions::new(vec![Ok("{\"anomalies\": []}".to_string())]);
        let detector = AnomalyDetector::new(client);

        let findings = detector.detect(&dataset(&[1000.0; 5])).await.unwrap();
        assert!(findings.is_empty());
        assert_eq!(detector.client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_response_retries_exactly_once() {
        let client = ScriptedCompletions::new(vec![
            Ok("this is not json".to_string()),
            Ok("still not json".to_string()),
        ]);
        let detector = AnomalyDetector::new(client);

        let err = detector.detect(&dataset(&[1000.0; 5])).await.unwrap_err();
        assert!(matches!(err, PipelineError::ModelResponse(_)));
        assert_eq!(detector.client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_malformed_then_valid_response_succeeds() {
        let client = ScriptedCompletions::new(vec![
            Ok("oops".to_string()),
            Ok(r#"{"anomalies": [{"record_index": 2, "reason": "spike", "severity": "High"}]}"#
                .to_string()),
        ]);
        let detector = AnomalyDetector::new(client);

        let findings = detector.detect(&dataset(&[1000.0; 5])).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].record_index, 2);
        assert_eq!(detector.client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_out_of_range_finding_is_model_response_error() {
        let client = ScriptedCompletions::new(vec![Ok(
            r#"{"anomalies": [{"record_index": 99, "reason": "spike", "severity": "Low"}]}"#
                .to_string(),
        )]);
        let detector = AnomalyDetector::new(client);

        let err = detector.detect(&dataset(&[1000.0; 5])).await.unwrap_err();
        assert!(matches!(err, PipelineError::ModelResponse(_)));
    }

    #[tokio::test]
    async fn test_oversized_dataset_rejected_before_any_call() {
        let client = ScriptedCompletions::new(vec![]);
        let detector = AnomalyDetector::new(client);

        let amounts = vec![1000.0; MAX_DETECTION_ROWS + 1];
        let err = detector.detect(&dataset(&amounts)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(detector.client.call_count(), 0);
    }

    #[test]
    fn test_table_rendering() {
        let data = dataset(&[1000.0, 2500.5]);
        let table = render_invoice_table(data.records(), 0);
        assert!(table.contains("| 0 | 2024-01-01 | 1000.00 | INFLOW | - |"));
        assert!(table.contains("| 1 | 2024-01-02 | 2500.50 | INFLOW | - |"));
    }
}
