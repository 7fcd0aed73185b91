use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Direction of an invoice as reported by the vendor API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum InvoiceType {
    #[serde(rename = "INFLOW")]
    #[schemars(description = "Money received: sales invoices issued to customers")]
    Inflow,

    #[serde(rename = "OUTFLOW")]
    #[schemars(description = "Money paid out: supplier invoices, payroll, transfers")]
    Outflow,
}

impl std::fmt::Display for InvoiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvoiceType::Inflow => write!(f, "INFLOW"),
            InvoiceType::Outflow => write!(f, "OUTFLOW"),
        }
    }
}

/// A single normalized invoice. Immutable once built by the extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: String,
    pub issue_date: NaiveDate,
    pub amount: f64,
    pub invoice_type: InvoiceType,
    pub counterparty: Option<String>,
    /// Vendor fields not lifted into the typed columns, kept verbatim.
    pub raw_fields: serde_json::Map<String, serde_json::Value>,
}

/// An ordered snapshot of invoices, sorted by issue date.
///
/// Datasets are never mutated in place: every date-range or type change rebuilds
/// the snapshot, and findings derived from the old snapshot must be discarded.
#[derive(Debug, Clone, Default)]
pub struct InvoiceDataset {
    records: Vec<InvoiceRecord>,
}

impl InvoiceDataset {
    pub fn from_records(mut records: Vec<InvoiceRecord>) -> Self {
        records.sort_by_key(|r| r.issue_date);
        Self { records }
    }

    pub fn records(&self) -> &[InvoiceRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&InvoiceRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records surrounding `center`, inclusive, clamped to the dataset bounds.
    pub fn context_window(&self, center: usize, radius: usize) -> &[InvoiceRecord] {
        if self.records.is_empty() {
            return &self.records;
        }
        let start = center.saturating_sub(radius);
        let end = center.saturating_add(radius + 1).min(self.records.len());
        &self.records[start.min(self.records.len() - 1)..end]
    }

    /// Summed amount per issue date, the series the dashboard plots.
    pub fn daily_totals(&self) -> BTreeMap<NaiveDate, f64> {
        let mut totals = BTreeMap::new();
        for record in &self.records {
            *totals.entry(record.issue_date).or_insert(0.0) += record.amount;
        }
        totals
    }

    /// Earliest and latest issue dates, used as default picker bounds.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => Some((first.issue_date, last.issue_date)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Severity {
    #[schemars(description = "Noticeable deviation, worth a look but plausibly legitimate")]
    Low,

    #[schemars(description = "Clear outlier against the surrounding period")]
    Medium,

    #[schemars(description = "Extreme deviation that demands immediate review")]
    High,
}

/// An AI-flagged anomalous invoice.
///
/// `record_index` is a positional reference into the dataset snapshot the
/// detection ran against. It does not survive a snapshot rebuild.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnomalyFinding {
    #[schemars(description = "Zero-based index of the anomalous record in the provided table")]
    pub record_index: usize,

    #[schemars(description = "Short explanation of why this amount is anomalous")]
    pub reason: String,

    #[schemars(description = "How strongly the amount deviates from the surrounding data")]
    pub severity: Severity,
}

/// Structured envelope the detection request asks the completion service for.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DetectionResponse {
    #[schemars(description = "All anomalies found; empty when the data looks normal")]
    pub anomalies: Vec<AnomalyFinding>,
}

/// Structured envelope for the per-anomaly analysis request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResponse {
    #[schemars(description = "Narrative explanation of the anomaly in context")]
    pub narrative: String,

    #[schemars(description = "Concrete follow-up actions for the reviewer")]
    pub recommendations: Vec<String>,
}

/// Final analysis handed back to the dashboard for one selected anomaly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub record_index: usize,
    pub narrative: String,
    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, date: NaiveDate, amount: f64) -> InvoiceRecord {
        InvoiceRecord {
            id: id.to_string(),
            issue_date: date,
            amount,
            invoice_type: InvoiceType::Inflow,
            counterparty: None,
            raw_fields: serde_json::Map::new(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_dataset_sorted_by_issue_date() {
        let dataset = InvoiceDataset::from_records(vec![
            record("b", date(2024, 1, 20), 200.0),
            record("a", date(2024, 1, 5), 100.0),
            record("c", date(2024, 1, 12), 150.0),
        ]);

        let dates: Vec<NaiveDate> = dataset.records().iter().map(|r| r.issue_date).collect();
        assert_eq!(
            dates,
            vec![date(2024, 1, 5), date(2024, 1, 12), date(2024, 1, 20)]
        );
    }

    #[test]
    fn test_context_window_clamps_at_edges() {
        let dataset = InvoiceDataset::from_records(
            (0..5)
                .map(|i| record(&i.to_string(), date(2024, 1, i + 1), 100.0))
                .collect(),
        );

        assert_eq!(dataset.context_window(0, 2).len(), 3);
        assert_eq!(dataset.context_window(2, 2).len(), 5);
        assert_eq!(dataset.context_window(4, 2).len(), 3);
        assert_eq!(dataset.context_window(4, 10).len(), 5);
    }

    #[test]
    fn test_daily_totals_groups_by_date() {
        let dataset = InvoiceDataset::from_records(vec![
            record("a", date(2024, 1, 5), 100.0),
            record("b", date(2024, 1, 5), 250.0),
            record("c", date(2024, 1, 6), 40.0),
        ]);

        let totals = dataset.daily_totals();
        assert_eq!(totals.len(), 2);
        assert!((totals[&date(2024, 1, 5)] - 350.0).abs() < f64::EPSILON);
        assert!((totals[&date(2024, 1, 6)] - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_date_span() {
        assert!(InvoiceDataset::default().date_span().is_none());

        let dataset = InvoiceDataset::from_records(vec![
            record("a", date(2024, 1, 20), 100.0),
            record("b", date(2024, 1, 3), 100.0),
        ]);
        assert_eq!(dataset.date_span(), Some((date(2024, 1, 3), date(2024, 1, 20))));
    }

    #[test]
    fn test_invoice_type_wire_format() {
        assert_eq!(
            serde_json::to_string(&InvoiceType::Inflow).unwrap(),
            "\"INFLOW\""
        );
        let parsed: InvoiceType = serde_json::from_str("\"OUTFLOW\"").unwrap();
        assert_eq!(parsed, InvoiceType::Outflow);
    }

    #[test]
    fn test_detection_response_schema_generation() {
        let schema = schemars::schema_for!(DetectionResponse);
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("anomalies"));
        assert!(json.contains("record_index"));
        assert!(json.contains("severity"));
    }
}
