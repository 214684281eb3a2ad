//! Size-limited JSON response parsing for the email vendor, mirroring
//! `research_search::http::json_with_limit`'s shape for `EmailError`
//! instead of `SearchError`.

use crate::error::EmailError;

pub const RESPONSE_SIZE_LIMIT: usize = 1024 * 1024;

pub async fn json_with_limit<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    limit: usize,
) -> Result<T, EmailError> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(EmailError::Request)?;
    if bytes.len() > limit {
        return Err(EmailError::Response(format!(
            "response body of {} bytes exceeds limit of {limit} bytes",
            bytes.len()
        )));
    }
    if !status.is_success() {
        let body = String::from_utf8_lossy(&bytes).to_string();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(EmailError::Response(format!(
                "vendor returned {status}: {body}"
            )));
        }
        return Err(EmailError::Client {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_slice(&bytes)
        .map_err(|err| EmailError::Response(format!("failed to decode JSON response: {err}")))
}
