//! Typed structured-output requests.
//!
//! Every stage that expects a typed payload goes through here, so a shape
//! mismatch is reported uniformly as [`GenerationError::Schema`] no matter
//! which agent asked. A failed parse triggers a corrective re-prompt (the
//! original user task plus the parse failure), bounded by
//! `RetryPolicy::max_schema_retries`.

use serde::de::DeserializeOwned;
use tracing::warn;

use super::{CompletionRequest, GenerationClient, GenerationError, RetryPolicy, complete_with_retry};
use crate::utils::json_ext::extract_json_payload;

/// Request a single typed value from the capability.
pub async fn request_structured<T: DeserializeOwned>(
    client: &dyn GenerationClient,
    request: &CompletionRequest,
    policy: &RetryPolicy,
) -> Result<T, GenerationError> {
    run_structured(client, request, policy, parse_value::<T>).await
}

/// Request a list of typed values.
///
/// Tolerates a single bare object where an array was expected (wrapped as a
/// one-element list) and skips elements that fail to parse individually,
/// matching the lenient intake the candidate loops rely on. An entirely
/// unparseable or empty payload is a schema violation.
pub async fn request_structured_list<T: DeserializeOwned>(
    client: &dyn GenerationClient,
    request: &CompletionRequest,
    policy: &RetryPolicy,
) -> Result<Vec<T>, GenerationError> {
    run_structured(client, request, policy, parse_list::<T>).await
}

async fn run_structured<T>(
    client: &dyn GenerationClient,
    request: &CompletionRequest,
    policy: &RetryPolicy,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<T, GenerationError> {
    let mut detail = String::new();
    for round in 0..=policy.max_schema_retries {
        let attempt_request = if round == 0 {
            request.clone()
        } else {
            CompletionRequest {
                user: format!(
                    "{}\n\nYour previous reply could not be used: {}. \
                     Reply again with ONLY the JSON payload, no commentary and no markdown fences.",
                    request.user, detail
                ),
                ..request.clone()
            }
        };
        let text = complete_with_retry(client, &attempt_request, policy).await?;
        match parse(&text) {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(agent = %request.agent, round, %err, "structured reply rejected");
                detail = err;
            }
        }
    }
    Err(GenerationError::Schema {
        agent: request.agent.clone(),
        detail,
    })
}

fn parse_value<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let payload = extract_json_payload(text).ok_or_else(|| "no JSON payload found".to_string())?;
    serde_json::from_str(payload).map_err(|e| e.to_string())
}

fn parse_list<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, String> {
    let payload = extract_json_payload(text).ok_or_else(|| "no JSON payload found".to_string())?;
    let value: serde_json::Value = serde_json::from_str(payload).map_err(|e| e.to_string())?;
    let elements = match value {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };
    let total = elements.len();
    let mut parsed = Vec::with_capacity(total);
    let mut first_err = None;
    for element in elements {
        match serde_json::from_value::<T>(element) {
            Ok(item) => parsed.push(item),
            Err(err) => {
                warn!(%err, "skipping unparseable list element");
                first_err.get_or_insert_with(|| err.to_string());
            }
        }
    }
    if parsed.is_empty() {
        return Err(first_err.unwrap_or_else(|| "payload contained no elements".to_string()));
    }
    Ok(parsed)
}
