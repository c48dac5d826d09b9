//! Best-effort announcement of issuance results to subscribers of the
//! issuing account's channel. Delivery failures never fail the issuance
//! request.

use crate::dtos::IssuanceResult;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Hub rejected event: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait IssuanceNotifier: Send + Sync {
    async fn publish(
        &self,
        account_id: &str,
        result: &IssuanceResult,
    ) -> Result<(), NotifierError>;
}

#[derive(Debug, Serialize)]
struct IssuanceEvent<'a> {
    event: &'static str,
    account_id: &'a str,
    details: &'a IssuanceResult,
}

/// Publishes to the push hub over HTTP, addressed by the issuing account's
/// channel group.
pub struct WebhookNotifier {
    endpoint: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl IssuanceNotifier for WebhookNotifier {
    async fn publish(
        &self,
        account_id: &str,
        result: &IssuanceResult,
    ) -> Result<(), NotifierError> {
        let url = format!("{}/channels/{}/events", self.endpoint, account_id);

        let response = self
            .client
            .post(&url)
            .json(&IssuanceEvent {
                event: "attribute-issuance",
                account_id,
                details: result,
            })
            .send()
            .await
            .map_err(|e| NotifierError::Connection(format!("Failed to reach hub: {}", e)))?;

        if !response.status().is_success() {
            return Err(NotifierError::Rejected(format!(
                "hub returned status {}",
                response.status()
            )));
        }

        tracing::debug!(account_id = %account_id, "Issuance event published");
        Ok(())
    }
}

/// Records published events instead of delivering them.
#[derive(Default)]
pub struct MockNotifier {
    published: std::sync::Mutex<Vec<(String, IssuanceResult)>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, IssuanceResult)> {
        self.published
            .lock()
            .expect("notifier mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl IssuanceNotifier for MockNotifier {
    async fn publish(
        &self,
        account_id: &str,
        result: &IssuanceResult,
    ) -> Result<(), NotifierError> {
        self.published
            .lock()
            .map_err(|e| NotifierError::Connection(format!("mutex poisoned: {}", e)))?
            .push((account_id.to_string(), result.clone()));
        Ok(())
    }
}
