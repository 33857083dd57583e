use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use super::ProviderError;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
const BODY_SNIPPET_LEN: usize = 200;

/// Builds the HTTP client shared by all adapters.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Maps a non-success HTTP status to the uniform error taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    let detail = format!("HTTP {}: {}", status.as_u16(), snippet(body));
    match status.as_u16() {
        401 | 403 => ProviderError::InvalidCredential(detail),
        // 402 is how several providers report an exhausted plan.
        402 | 429 => ProviderError::RateLimited(detail),
        404 | 410 => ProviderError::NotFound(detail),
        408 => ProviderError::Transient(detail),
        s if (500..600).contains(&s) => ProviderError::Transient(detail),
        // Remaining 4xx: this provider cannot serve this subject.
        s if (400..500).contains(&s) => ProviderError::NotFound(detail),
        _ => ProviderError::Transient(detail),
    }
}

/// Connection failures, timeouts and body read errors are all retryable.
pub fn classify_transport(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Transient(format!("request timed out: {err}"))
    } else {
        ProviderError::Transient(err.to_string())
    }
}

/// Classifies an error message embedded in an otherwise successful response body.
pub fn classify_error_message(message: &str) -> ProviderError {
    let lower = message.to_lowercase();
    let detail = snippet(message);
    if ["limit", "quota", "credits", "too many"]
        .iter()
        .any(|k| lower.contains(k))
    {
        ProviderError::RateLimited(detail)
    } else if ["api key", "api_key", "unauthorized", "forbidden", "invalid key"]
        .iter()
        .any(|k| lower.contains(k))
    {
        ProviderError::InvalidCredential(detail)
    } else if ["not found", "does not exist", "no profile", "private"]
        .iter()
        .any(|k| lower.contains(k))
    {
        ProviderError::NotFound(detail)
    } else {
        ProviderError::Transient(detail)
    }
}

/// Reads a response as JSON, classifying any non-2xx status first.
pub async fn read_json(response: Response) -> Result<Value, ProviderError> {
    let status = response.status();
    let body = response.text().await.map_err(classify_transport)?;

    if !status.is_success() {
        return Err(classify_status(status, &body));
    }

    serde_json::from_str(&body)
        .map_err(|e| ProviderError::Transient(format!("malformed JSON body: {e}")))
}

/// Returns the provider's error text when a 2xx body is really an error report.
pub fn embedded_error(body: &Value) -> Option<String> {
    let obj = body.as_object()?;
    let error = obj.get("error").filter(|v| !v.is_null());
    if obj.get("success").and_then(Value::as_bool) == Some(false) || error.is_some() {
        let message = error
            .or_else(|| obj.get("message"))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "provider reported failure".to_string());
        return Some(message);
    }
    // A bare `message` with no profile fields is an error notice, not a profile.
    if obj.len() <= 2 {
        if let Some(Value::String(message)) = obj.get("message") {
            return Some(message.clone());
        }
    }
    None
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_SNIPPET_LEN {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(BODY_SNIPPET_LEN).collect();
        format!("{cut}…")
    }
}
