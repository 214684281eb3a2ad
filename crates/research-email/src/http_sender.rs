//! `HttpEmailSender`: a generic HTTP-vendor `EmailSender`, grounded on
//! `dashflow-serper`'s shape (builder, shared client, bearer header,
//! size-limited JSON parsing, retry-with-backoff) applied to a different
//! vendor contract.

use async_trait::async_trait;
use serde::Deserialize;

use research_search::{http::build_client, retry::with_backoff};

use crate::error::EmailError;
use crate::http::json_with_limit;
use crate::provider::{EmailSender, SendRequest, SendResponse};

pub struct HttpEmailSender {
    endpoint: String,
    api_key: String,
    from_address: String,
    client: reqwest::Client,
}

pub struct HttpEmailSenderBuilder {
    endpoint: Option<String>,
    api_key: Option<String>,
    from_address: Option<String>,
}

impl HttpEmailSenderBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            from_address: None,
        }
    }

    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn from_address(mut self, address: impl Into<String>) -> Self {
        self.from_address = Some(address.into());
        self
    }

    pub fn build(self) -> Result<HttpEmailSender, EmailError> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| EmailError::Configuration("email endpoint is required".into()))?;
        let api_key = self
            .api_key
            .ok_or_else(|| EmailError::Configuration("email api key is required".into()))?;
        let from_address = self
            .from_address
            .ok_or_else(|| EmailError::Configuration("email from address is required".into()))?;
        Ok(HttpEmailSender {
            endpoint,
            api_key,
            from_address,
            client: build_client(),
        })
    }
}

impl Default for HttpEmailSenderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct VendorResponse {
    id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpEmailSender {
    async fn send_once(&self, request: &SendRequest) -> Result<SendResponse, EmailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from_address,
                "to": request.to,
                "subject": request.subject,
                "html": request.html_body,
            }))
            .send()
            .await
            .map_err(EmailError::Request)?;

        let body: VendorResponse =
            json_with_limit(response, crate::http::RESPONSE_SIZE_LIMIT).await?;

        match body.error {
            Some(err) => Err(EmailError::Rejected(err)),
            None => Ok(SendResponse {
                ok: true,
                id: body.id,
                error: None,
            }),
        }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, request: SendRequest) -> Result<SendResponse, EmailError> {
        with_backoff(|| self.send_once(&request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_all_fields() {
        assert!(HttpEmailSenderBuilder::new().build().is_err());
        assert!(HttpEmailSenderBuilder::new()
            .endpoint("https://mail.example.com/send")
            .api_key("key")
            .build()
            .is_err());
    }

    #[test]
    fn builder_succeeds_with_all_fields() {
        let sender = HttpEmailSenderBuilder::new()
            .endpoint("https://mail.example.com/send")
            .api_key("key")
            .from_address("reports@example.com")
            .build();
        assert!(sender.is_ok());
    }
}
