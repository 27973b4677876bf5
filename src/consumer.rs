//! NATS subscriptions for prediction and reload requests

use crate::error::EncodingError;
use anyhow::Result;
use async_nats::{Client, Subscriber};
use serde_json::Value;
use tracing::{info, warn};

/// Receives request messages on one subject.
///
/// With a queue group set, replicas subscribed to the same subject share the
/// requests instead of each answering every one.
pub struct RequestConsumer {
    client: Client,
    subject: String,
    queue_group: Option<String>,
}

impl RequestConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            queue_group: None,
        }
    }

    pub fn with_queue_group(mut self, group: Option<String>) -> Self {
        self.queue_group = group;
        self
    }

    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = match &self.queue_group {
            Some(group) => {
                self.client
                    .queue_subscribe(self.subject.clone(), group.clone())
                    .await?
            }
            None => self.client.subscribe(self.subject.clone()).await?,
        };
        info!(
            subject = %self.subject,
            queue_group = ?self.queue_group,
            "Subscribed to request subject"
        );
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Decode a request body into the JSON payload handed to the encoder.
///
/// Anything that is not valid JSON is rejected as an invalid payload; shape
/// checks happen later in [`crate::types::request::RawInput::from_payload`].
pub fn decode_request(body: &[u8]) -> Result<Value, EncodingError> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, bytes = body.len(), "Failed to decode request payload");
        EncodingError::InvalidPayload
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_request() {
        let payload = decode_request(br#"{"symptoms": "fever"}"#).unwrap();
        assert_eq!(payload["symptoms"], "fever");

        // shape is checked by the encoder, not here
        assert!(decode_request(b"[1, 2]").is_ok());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_request(b"symptoms=fever"),
            Err(EncodingError::InvalidPayload)
        ));
        assert!(matches!(
            decode_request(b""),
            Err(EncodingError::InvalidPayload)
        ));
    }
}
