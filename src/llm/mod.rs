pub mod analyst;
pub mod client;
pub mod detector;
pub mod prompts;
pub mod summarizer;

pub use analyst::*;
pub use client::*;
pub use detector::*;
pub use summarizer::*;

use crate::error::{PipelineError, Result};
use log::warn;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

/// Ask the completion service for a `T` and parse it against its schema.
///
/// Exactly one reattempt on a malformed response, then the error surfaces.
/// Transport failures are not retried here; bounding latency and cost matters
/// more than salvaging a flaky call.
pub(crate) async fn request_structured<T, C>(client: &C, system: &str, user: &str) -> Result<T>
where
    T: DeserializeOwned + JsonSchema,
    C: CompletionService,
{
    let schema = serde_json::to_value(schemars::schema_for!(T))?;

    let mut attempt = 1;
    loop {
        let raw = client
            .complete(CompletionRequest {
                system,
                user,
                response_schema: Some(schema.clone()),
            })
            .await?;

        match serde_json::from_str::<T>(&clean_json_output(&raw)) {
            Ok(value) => return Ok(value),
            Err(e) if attempt == 1 => {
                warn!("Malformed completion response, reattempting once: {}", e);
                attempt += 1;
            }
            Err(e) => {
                return Err(PipelineError::ModelResponse(format!(
                    "response did not match the expected structure after reattempt: {}",
                    e
                )))
            }
        }
    }
}

/// Strip markdown fences or prose the model sometimes wraps around its JSON.
fn clean_json_output(raw: &str) -> String {
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            return raw[start..=end].to_string();
        }
    }
    if let (Some(start), Some(end)) = (raw.find('['), raw.rfind(']')) {
        if start < end {
            return raw[start..=end].to_string();
        }
    }
    raw.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_json_output_strips_fences() {
        let raw = "```json\n{\"anomalies\": []}\n```";
        assert_eq!(clean_json_output(raw), "{\"anomalies\": []}");
    }

    #[test]
    fn test_clean_json_output_passes_plain_json() {
        assert_eq!(clean_json_output("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_clean_json_output_trims_non_json() {
        assert_eq!(clean_json_output("  no json here "), "no json here");
    }
}
