use crate::client::VendorApi;
use crate::error::{PipelineError, Result};
use crate::model::{InvoiceDataset, InvoiceRecord, InvoiceType};
use chrono::NaiveDate;
use log::{debug, info};
use serde_json::Value;

/// Raw vendor fields every invoice object must carry.
const REQUIRED_FIELDS: [&str; 4] = ["id", "invoice_date", "total_amount", "type"];

/// Drives the vendor client across a date range and accumulates pages into a
/// single normalized dataset.
pub struct Extractor<A> {
    api: A,
}

impl<A: VendorApi> Extractor<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Fetch every invoice for `link_id`, keeping only records inside
    /// `[start_date, end_date]` that match `type_filter`.
    ///
    /// Any page that cannot be parsed aborts the whole extraction: partial
    /// data would mislead anomaly detection downstream.
    pub async fn extract(
        &self,
        link_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        type_filter: InvoiceType,
    ) -> Result<InvoiceDataset> {
        if start_date > end_date {
            return Err(PipelineError::Validation(format!(
                "start_date {} is after end_date {}",
                start_date, end_date
            )));
        }

        info!(
            "Extracting {} invoices for link {} between {} and {}",
            type_filter, link_id, start_date, end_date
        );

        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page_number = 0usize;

        loop {
            page_number += 1;
            let page = self.api.fetch_page(link_id, cursor.as_deref()).await?;
            debug!(
                "Page {}: {} raw records, has next page: {}",
                page_number,
                page.results.len(),
                page.next.is_some()
            );

            for (position, raw) in page.results.iter().enumerate() {
                let record = parse_record(raw).map_err(|e| {
                    PipelineError::Extraction(format!(
                        "page {}, record {}: {}",
                        page_number, position, e
                    ))
                })?;

                if record.invoice_type == type_filter
                    && record.issue_date >= start_date
                    && record.issue_date <= end_date
                {
                    records.push(record);
                }
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!("Extraction complete: {} matching records", records.len());
        Ok(InvoiceDataset::from_records(records))
    }
}

/// Normalize one raw vendor object. The error string here is page-agnostic;
/// the caller wraps it with page/position context.
fn parse_record(raw: &Value) -> std::result::Result<InvoiceRecord, String> {
    let object = raw
        .as_object()
        .ok_or_else(|| "expected a JSON object".to_string())?;

    for field in REQUIRED_FIELDS {
        if !object.contains_key(field) {
            return Err(format!("missing required field '{}'", field));
        }
    }

    let id = object["id"]
        .as_str()
        .ok_or_else(|| "field 'id' is not a string".to_string())?
        .to_string();

    let issue_date = object["invoice_date"]
        .as_str()
        .ok_or_else(|| "field 'invoice_date' is not a string".to_string())
        .and_then(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| format!("field 'invoice_date' is not a valid date: {}", e))
        })?;

    let amount = object["total_amount"]
        .as_f64()
        .ok_or_else(|| "field 'total_amount' is not a number".to_string())?;

    let invoice_type: InvoiceType = serde_json::from_value(object["type"].clone())
        .map_err(|e| format!("field 'type' is not a known invoice type: {}", e))?;

    let counterparty = object
        .get("sender_name")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let mut raw_fields = object.clone();
    for field in REQUIRED_FIELDS {
        raw_fields.remove(field);
    }
    raw_fields.remove("sender_name");

    Ok(InvoiceRecord {
        id,
        issue_date,
        amount,
        invoice_type,
        counterparty,
        raw_fields,
    })
}
