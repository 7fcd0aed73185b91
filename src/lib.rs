//! # Invoice Anomaly Pipeline
//!
//! A library for pulling invoice data from a vendor's paginated fiscal API,
//! normalizing it into a dated dataset, and asking a hosted completion service
//! to flag and explain anomalous amounts.
//!
//! ## Core Concepts
//!
//! - **Dataset snapshot**: invoices for one date range and type, sorted by
//!   issue date; rebuilt on every selection change, never mutated in place
//! - **Finding**: an AI-flagged anomalous record, referenced by position
//!   within the snapshot it was derived from
//! - **Session**: the explicit context object a dashboard drives; it owns the
//!   current snapshot and discards stale findings whenever it is rebuilt
//! - **Structured output**: every completion request carries a JSON schema,
//!   so an unparseable response is a deterministic `ModelResponse` error
//!
//! ## Example
//!
//! ```rust,ignore
//! use invoice_anomaly_pipeline::*;
//! use chrono::NaiveDate;
//!
//! # async fn run() -> Result<()> {
//! let vendor = VendorClient::new(VendorConfig::from_env()?)?;
//! let gemini = GeminiClient::from_env("gemini-2.0-flash")?;
//!
//! let mut session = AnalysisSession::new(
//!     Extractor::new(vendor),
//!     AnomalyDetector::new(gemini.clone()),
//!     FinancialAnalysisAgent::new(gemini),
//! );
//!
//! session
//!     .load(
//!         "c4432b21-b248-4bff-ab46-05ec06a22da1",
//!         NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
//!         InvoiceType::Outflow,
//!     )
//!     .await?;
//!
//! if let DetectionOutcome::Findings(findings) = session.detect().await? {
//!     let report = session.analyze(0).await?;
//!     println!("{}", report.narrative);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod extractor;
pub mod llm;
pub mod model;
pub mod session;

pub use client::{InvoicePage, VendorApi, VendorClient, VendorConfig};
pub use error::{PipelineError, Result};
pub use extractor::Extractor;
pub use llm::{
    AnomalyDetector, CompletionRequest, CompletionService, FinancialAnalysisAgent, GeminiClient,
    MarkdownResponse, Summarizer,
};
pub use model::{
    AnalysisReport, AnalysisResponse, AnomalyFinding, DetectionResponse, InvoiceDataset,
    InvoiceRecord, InvoiceType, Severity,
};
pub use session::{AnalysisSession, DetectionOutcome};
