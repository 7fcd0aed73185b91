//! Run the full pipeline against the real vendor API and Gemini.
//!
//! Requires BASE_URL, CLIENT_ID, CLIENT_SECRET and GEMINI_API_KEY in the
//! environment (or a .env file).
//!
//! Run: cargo run --example detect_anomalies -- <link_id>

use anyhow::Context;
use chrono::NaiveDate;
use invoice_anomaly_pipeline::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let link_id = std::env::args()
        .nth(1)
        .context("usage: detect_anomalies <link_id>")?;

    let vendor = VendorClient::new(VendorConfig::from_env()?)?;
    let gemini = GeminiClient::from_env("gemini-2.0-flash")?;

    let mut session = AnalysisSession::new(
        Extractor::new(vendor),
        AnomalyDetector::new(gemini.clone()),
        FinancialAnalysisAgent::new(gemini.clone()),
    );

    let dataset = session
        .load(
            &link_id,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            InvoiceType::Outflow,
        )
        .await?;
    println!("Extracted {} invoices", dataset.len());

    match session.detect().await? {
        DetectionOutcome::NoData => {
            println!("No data in the selected range.");
        }
        DetectionOutcome::Findings(findings) if findings.is_empty() => {
            println!("No anomalies detected.");
        }
        DetectionOutcome::Findings(findings) => {
            for (i, finding) in findings.iter().enumerate() {
                println!(
                    "[{}] record {} ({:?}): {}",
                    i, finding.record_index, finding.severity, finding.reason
                );
            }

            let report = session.analyze(0).await?;
            println!("\n{}\n", report.narrative);
            for rec in &report.recommendations {
                println!("- {}", rec);
            }

            let summarizer = Summarizer::new(GeminiClient::from_env("gemini-2.0-flash")?);
            let summary = summarizer
                .summarize(session.dataset().unwrap(), session.findings())
                .await?;
            println!("\n{}", summary);
        }
    }

    Ok(())
}
