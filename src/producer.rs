//! NATS publisher for prediction responses

use crate::types::PredictionResponse;
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Publishes responses to the caller's reply inbox, or to a fixed subject
/// when the request carried none.
#[derive(Clone)]
pub struct ResponsePublisher {
    client: Client,
    subject: String,
}

impl ResponsePublisher {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    pub async fn publish(&self, reply: Option<String>, response: &PredictionResponse) -> Result<()> {
        let payload = serde_json::to_vec(response)?;
        let subject = reply.unwrap_or_else(|| self.subject.clone());

        self.client.publish(subject.clone(), payload.into()).await?;

        debug!(
            response_id = %response.response_id,
            subject = %subject,
            ok = response.is_ok(),
            "Published prediction response"
        );

        Ok(())
    }

    /// Subject used when a request has no reply inbox
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
