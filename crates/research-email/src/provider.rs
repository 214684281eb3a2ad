//! `EmailSender` (§6.5): `send({to, subject, htmlBody}) -> {ok, id?, error?}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EmailError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub ok: bool,
    pub id: Option<String>,
    pub error: Option<String>,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, request: SendRequest) -> Result<SendResponse, EmailError>;
}
