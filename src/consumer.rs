//! NATS request consumer for the risk service subjects

use crate::config::NatsConfig;
use anyhow::Result;
use async_nats::{Client, Message};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Which operation a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Score and persist a transaction
    Score,
    /// Load a stored prediction
    Lookup,
    /// Summarize a vendor's history
    History,
}

/// An incoming request and the subject family it arrived on
pub struct Request {
    pub kind: RequestKind,
    pub message: Message,
}

/// Payload of a lookup request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupRequest {
    pub prediction_id: String,
}

/// Payload of a vendor history request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub vendor: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Consumer for the score, lookup and history request subjects
pub struct RequestConsumer {
    client: Client,
    subjects: Vec<(RequestKind, String)>,
}

impl RequestConsumer {
    /// Create a new request consumer
    pub fn new(client: Client, config: &NatsConfig) -> Self {
        Self {
            client,
            subjects: vec![
                (RequestKind::Score, config.score_subject.clone()),
                (RequestKind::Lookup, config.lookup_subject.clone()),
                (RequestKind::History, config.history_subject.clone()),
            ],
        }
    }

    /// Subscribe to every request subject and merge them into one stream
    pub async fn subscribe(&self) -> Result<BoxStream<'static, Request>> {
        let mut streams = Vec::with_capacity(self.subjects.len());
        for (kind, subject) in &self.subjects {
            let kind = *kind;
            let subscriber = self.client.subscribe(subject.clone()).await?;
            info!(subject = %subject, kind = ?kind, "Subscribed to request subject");
            streams.push(subscriber.map(move |message| Request { kind, message }).boxed());
        }
        Ok(stream::select_all(streams).boxed())
    }

    /// Get the subscribed subjects
    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.subjects.iter().map(|(_, s)| s.as_str())
    }
}
