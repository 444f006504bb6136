//! NATS replies and anomaly alerts

use crate::types::prediction::PredictionRecord;
use anyhow::Result;
use async_nats::{Client, Message};
use serde::Serialize;
use tracing::debug;

/// Publishes request replies and anomalous predictions
#[derive(Clone)]
pub struct ReplyProducer {
    client: Client,
    alert_subject: String,
}

impl ReplyProducer {
    /// Create a new producer
    pub fn new(client: Client, alert_subject: &str) -> Self {
        Self {
            client,
            alert_subject: alert_subject.to_string(),
        }
    }

    /// Answer a request; fire-and-forget messages get no reply
    pub async fn reply<T: Serialize + ?Sized>(&self, request: &Message, body: &T) -> Result<()> {
        let Some(reply) = request.reply.clone() else {
            debug!(subject = %request.subject, "Request has no reply subject");
            return Ok(());
        };

        let payload = serde_json::to_vec(body)?;
        self.client.publish(reply, payload.into()).await?;
        Ok(())
    }

    /// Answer a request with `{"error": ..}`
    pub async fn reply_error(&self, request: &Message, error: &str) -> Result<()> {
        self.reply(request, &serde_json::json!({ "error": error })).await
    }

    /// Publish an anomalous prediction record
    pub async fn publish_alert(&self, record: &PredictionRecord) -> Result<()> {
        let payload = serde_json::to_vec(record)?;

        self.client
            .publish(self.alert_subject.clone(), payload.into())
            .await?;

        debug!(
            prediction_id = %record.prediction_id,
            vendor = %record.input.vendor,
            risk_score = record.output.risk_score,
            "Published anomaly alert"
        );

        Ok(())
    }

    /// Get the alert subject name
    pub fn alert_subject(&self) -> &str {
        &self.alert_subject
    }
}
