use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Vendor API rejected the credentials: {0}")]
    AuthenticationFailed(String),

    #[error("Vendor API throttled the request: {0}")]
    RateLimited(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Vendor API returned status {status}: {body}")]
    VendorStatus { status: u16, body: String },

    #[error("Completion service returned an unusable response: {0}")]
    ModelResponse(String),

    #[error("Finding references record {index} outside a dataset of {len} records")]
    StaleFinding { index: usize, len: usize },

    #[error("Missing configuration value: {0}")]
    MissingConfig(&'static str),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
