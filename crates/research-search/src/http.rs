//! Shared HTTP client construction and size-limited response parsing,
//! grounded on `dashflow-serper`'s `create_http_client`/`json_with_limit`
//! helpers. Reused by both search-provider crates and `research-email`.

use std::time::Duration;

use crate::error::SearchError;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Response bodies larger than this are rejected rather than buffered in
/// full, guarding against a misbehaving or hostile vendor response.
pub const RESPONSE_SIZE_LIMIT: usize = 10 * 1024 * 1024;

/// Builds a `reqwest::Client` with the connect/request timeouts every
/// provider in this workspace uses unless it has a documented reason to
/// override them.
pub fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Reads `response` bounded by `limit` bytes and deserializes it as JSON.
/// Mirrors `dashflow-serper::json_with_limit`.
pub async fn json_with_limit<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    limit: usize,
) -> Result<T, SearchError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(SearchError::Request)?;
    if bytes.len() > limit {
        return Err(SearchError::Response(format!(
            "response body of {} bytes exceeds limit of {limit} bytes",
            bytes.len()
        )));
    }
    if !status.is_success() {
        let body = String::from_utf8_lossy(&bytes).to_string();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(SearchError::Response(format!(
                "vendor returned {status}: {body}"
            )));
        }
        return Err(SearchError::Client {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_slice(&bytes)
        .map_err(|err| SearchError::Response(format!("failed to decode JSON response: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_client_succeeds() {
        let _client = build_client();
    }
}
