use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::error::NotifyError;
use super::types::{DeployNotice, NoticeAck};

/// Posts deploy notices as JSON to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: Client,
    url: String,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends `notice`. An empty or non-JSON success body yields a default ack.
    pub async fn post(&self, notice: &DeployNotice) -> Result<NoticeAck, NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .header("accept", "application/json")
            .json(notice)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(NotifyError::Api {
                status: status.as_u16(),
                message: if body.is_empty() {
                    "unknown error".to_string()
                } else {
                    body
                },
            });
        }

        debug!(url = %self.url, status = status.as_u16(), "deploy notice delivered");
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }
}
