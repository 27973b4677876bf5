//! NATS reply publisher for prediction results

use crate::error::{ErrorKind, PredictionError};
use crate::types::prediction::{ErrorResponse, PredictionResponse, PredictionSet};
use anyhow::Result;
use async_nats::{Client, Subject};
use serde::Serialize;
use tracing::debug;

/// Serialize the reply for a finished request.
pub fn reply_body(outcome: &Result<PredictionSet, PredictionError>) -> Result<Vec<u8>> {
    let body = match outcome {
        Ok(predictions) => serde_json::to_vec(&PredictionResponse::new(predictions.clone()))?,
        Err(e) => serde_json::to_vec(&ErrorResponse::from(e))?,
    };
    Ok(body)
}

/// Serialize the reply for a request whose handling was aborted before it
/// produced an outcome.
pub fn aborted_body(reason: &str) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&ErrorResponse::new(
        reason,
        ErrorKind::Unavailable,
    ))?)
}

/// Publisher for request replies
#[derive(Clone)]
pub struct ReplyPublisher {
    client: Client,
}

impl ReplyPublisher {
    /// Create a new reply publisher
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Publish a serialisable reply to the requester's inbox
    pub async fn reply<T: Serialize>(&self, reply_to: Subject, body: &T) -> Result<()> {
        let payload = serde_json::to_vec(body)?;
        self.reply_raw(reply_to, payload).await
    }

    /// Publish an already serialised reply
    pub async fn reply_raw(&self, reply_to: Subject, payload: Vec<u8>) -> Result<()> {
        let size = payload.len();
        self.client.publish(reply_to.clone(), payload.into()).await?;

        debug!(reply_to = %reply_to, bytes = size, "Published reply");
        Ok(())
    }
}
