//! A fake [`EmailSender`] recording every send and, by default, accepting
//! all of them.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use research_email::{EmailError, EmailSender, SendRequest, SendResponse};

#[derive(Clone, Default)]
pub struct MockEmailSender {
    sent: Arc<Mutex<Vec<SendRequest>>>,
    should_fail: Arc<Mutex<bool>>,
    error_message: Arc<Mutex<Option<String>>>,
}

impl MockEmailSender {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, message: impl Into<String>) {
        *self.should_fail.lock().unwrap() = true;
        *self.error_message.lock().unwrap() = Some(message.into());
    }

    #[must_use]
    pub fn sent(&self) -> Vec<SendRequest> {
        self.sent.lock().unwrap().clone()
    }

    #[must_use]
    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    async fn send(&self, request: SendRequest) -> Result<SendResponse, EmailError> {
        {
            let mut should_fail = self.should_fail.lock().unwrap();
            if *should_fail {
                *should_fail = false;
                let message = self.error_message.lock().unwrap().take().unwrap_or_else(|| "mock send failure".to_string());
                return Ok(SendResponse { ok: false, id: None, error: Some(message) });
            }
        }

        self.sent.lock().unwrap().push(request);
        Ok(SendResponse { ok: true, id: Some(uuid::Uuid::new_v4().to_string()), error: None })
    }
}
