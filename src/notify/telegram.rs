//! Telegram Bot API notifier

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Notifier;
use crate::config::NotifierConfig;
use crate::error::{MarketError, MarketResult};

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends messages through `sendMessage`
pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl TelegramNotifier {
    pub fn new(api_base: &str, token: &str, timeout: Duration) -> MarketResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketError::ExternalService(format!("telegram client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), token),
        })
    }

    /// `None` when no bot token is configured
    pub fn from_config(config: &NotifierConfig) -> MarketResult<Option<Self>> {
        match &config.telegram_token {
            Some(token) if !token.is_empty() => Ok(Some(Self::new(
                &config.telegram_api,
                token,
                Duration::from_secs(config.timeout_secs),
            )?)),
            _ => Ok(None),
        }
    }

    async fn send(&self, chat_id: &str, text: &str) -> MarketResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessage { chat_id, text })
            .send()
            .await
            .map_err(|e| MarketError::ExternalService(e.to_string()))?;

        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| MarketError::ExternalService(format!("HTTP {}: {}", status, e)))?;
        if !body.ok {
            return Err(MarketError::ExternalService(
                body.description
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn notify(&self, handle: &str, name: &str, text: &str) -> bool {
        match self.send(handle, text).await {
            Ok(()) => {
                debug!(handle, name, "Telegram message sent");
                true
            }
            Err(e) => {
                warn!(handle, name, error = %e, "Telegram message failed");
                false
            }
        }
    }
}
