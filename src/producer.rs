//! NATS publisher for prediction replies

use crate::types::response::PredictionReply;
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Publishes replies to callers and, optionally, results to a broadcast subject
#[derive(Clone)]
pub struct ReplyProducer {
    client: Client,
    results_subject: Option<String>,
}

impl ReplyProducer {
    /// Create a new reply producer
    pub fn new(client: Client, results_subject: Option<&str>) -> Self {
        Self {
            client,
            results_subject: results_subject.map(str::to_string),
        }
    }

    /// Answer a request on its reply subject
    pub async fn reply(&self, reply_to: Subject, reply: &PredictionReply) -> Result<()> {
        let payload = serde_json::to_vec(reply)?;

        self.client.publish(reply_to.clone(), payload.into()).await?;

        debug!(
            request_id = %reply.request_id(),
            reply_to = %reply_to,
            ok = reply.is_ok(),
            "Published prediction reply"
        );

        Ok(())
    }

    /// Broadcast a successful result when a results subject is configured
    pub async fn broadcast(&self, reply: &PredictionReply) -> Result<()> {
        let Some(subject) = &self.results_subject else {
            return Ok(());
        };
        if !reply.is_ok() {
            return Ok(());
        }

        let payload = serde_json::to_vec(reply)?;
        self.client.publish(subject.clone(), payload.into()).await?;

        debug!(
            request_id = %reply.request_id(),
            subject = %subject,
            "Broadcast prediction result"
        );

        Ok(())
    }

    /// Get the results subject, if any
    pub fn results_subject(&self) -> Option<&str> {
        self.results_subject.as_deref()
    }
}
