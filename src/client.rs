use crate::error::{PipelineError, Result};
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

const PAGE_SIZE: usize = 100;
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One raw page from the vendor's invoice endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoicePage {
    pub results: Vec<serde_json::Value>,
    /// Opaque pagination token; absent on the last page.
    pub next: Option<String>,
}

/// Seam between the extractor and the vendor API, so extraction logic can be
/// driven by scripted pages in tests.
pub trait VendorApi {
    fn fetch_page(
        &self,
        link_id: &str,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<InvoicePage>> + Send;
}

#[derive(Debug, Clone)]
pub struct VendorConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl VendorConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: require_env("BASE_URL")?,
            client_id: require_env("CLIENT_ID")?,
            client_secret: require_env("CLIENT_SECRET")?,
        })
    }
}

fn require_env(name: &'static str) -> Result<String> {
    std::env::var(name).map_err(|_| PipelineError::MissingConfig(name))
}

/// Authenticated client for the vendor's paginated fiscal endpoints.
#[derive(Clone)]
pub struct VendorClient {
    client: Client,
    config: VendorConfig,
}

impl VendorClient {
    pub fn new(config: VendorConfig) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    async fn request_page(&self, link_id: &str, cursor: Option<&str>) -> Result<InvoicePage> {
        let url = page_url(&self.config.base_url, link_id, cursor);
        debug!("Fetching invoice page: {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        Ok(response.json::<InvoicePage>().await?)
    }
}

impl VendorApi for VendorClient {
    async fn fetch_page(&self, link_id: &str, cursor: Option<&str>) -> Result<InvoicePage> {
        retry_transient(|| self.request_page(link_id, cursor)).await
    }
}

/// Map a non-success vendor status to the error taxonomy. Authentication and
/// throttling failures get their own classes; everything else carries the
/// status code structurally so retry classification does not depend on
/// message wording.
fn status_error(status: StatusCode, body: String) -> PipelineError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            PipelineError::AuthenticationFailed(format!("status {}: {}", status, body))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            PipelineError::RateLimited(format!("status {}: {}", status, body))
        }
        _ => PipelineError::VendorStatus {
            status: status.as_u16(),
            body,
        },
    }
}

/// Run `request`, retrying transient failures with a bounded backoff.
/// Authentication and throttling errors surface immediately; retrying them
/// would not help.
async fn retry_transient<T, F, Fut>(mut request: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < MAX_ATTEMPTS && is_transient(&err) => {
                warn!(
                    "Transient vendor API failure (attempt {}/{}): {}",
                    attempt, MAX_ATTEMPTS, err
                );
                sleep(RETRY_BASE_DELAY * attempt).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_transient(err: &PipelineError) -> bool {
    match err {
        PipelineError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        PipelineError::VendorStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

fn page_url(base_url: &str, link_id: &str, cursor: Option<&str>) -> String {
    let base = base_url.trim_end_matches('/');
    match cursor {
        Some(cursor) => format!(
            "{}/api/invoices/?link={}&page_size={}&cursor={}",
            base, link_id, PAGE_SIZE, cursor
        ),
        None => format!("{}/api/invoices/?link={}&page_size={}", base, link_id, PAGE_SIZE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn server_error(status: u16) -> PipelineError {
        PipelineError::VendorStatus {
            status,
            body: "boom".to_string(),
        }
    }

    fn empty_page() -> InvoicePage {
        InvoicePage {
            results: vec![],
            next: None,
        }
    }

    #[test]
    fn test_page_url_without_cursor() {
        let url = page_url("https://api.example.com/", "abc-123", None);
        assert_eq!(
            url,
            "https://api.example.com/api/invoices/?link=abc-123&page_size=100"
        );
    }

    #[test]
    fn test_page_url_with_cursor() {
        let url = page_url("https://api.example.com", "abc-123", Some("tok42"));
        assert!(url.ends_with("&cursor=tok42"));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, String::new()),
            PipelineError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, String::new()),
            PipelineError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, String::new()),
            PipelineError::RateLimited(_)
        ));
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, String::new()),
            PipelineError::VendorStatus { status: 503, .. }
        ));
        assert!(matches!(
            status_error(StatusCode::IM_A_TEAPOT, String::new()),
            PipelineError::VendorStatus { status: 418, .. }
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&server_error(500)));
        assert!(is_transient(&server_error(503)));
        assert!(!is_transient(&server_error(404)));
        assert!(!is_transient(&PipelineError::RateLimited("429".to_string())));
        assert!(!is_transient(&PipelineError::AuthenticationFailed(
            "401".to_string()
        )));
    }

    #[tokio::test]
    async fn test_retry_stops_after_bounded_attempts() {
        let calls = Cell::new(0u32);
        let err = retry_transient(|| {
            calls.set(calls.get() + 1);
            async { Err::<InvoicePage, _>(server_error(503)) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.get(), MAX_ATTEMPTS);
        assert!(matches!(err, PipelineError::VendorStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_retry_recovers_after_one_transient_failure() {
        let calls = Cell::new(0u32);
        let page = retry_transient(|| {
            calls.set(calls.get() + 1);
            let attempt = calls.get();
            async move {
                if attempt == 1 {
                    Err(server_error(500))
                } else {
                    Ok(empty_page())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.get(), 2);
        assert!(page.results.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_without_retry() {
        let calls = Cell::new(0u32);
        let err = retry_transient(|| {
            calls.set(calls.get() + 1);
            async { Err::<InvoicePage, _>(PipelineError::RateLimited("throttled".to_string())) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.get(), 1);
        assert!(matches!(err, PipelineError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_auth_failure_surfaces_without_retry() {
        let calls = Cell::new(0u32);
        let err = retry_transient(|| {
            calls.set(calls.get() + 1);
            async {
                Err::<InvoicePage, _>(PipelineError::AuthenticationFailed(
                    "bad credentials".to_string(),
                ))
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.get(), 1);
        assert!(matches!(err, PipelineError::AuthenticationFailed(_)));
    }
}
