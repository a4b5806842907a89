//! Operator payout notifiers

use crate::channels::{bot_endpoint, send_message};
use crate::config::{NotifierConfig, NotifierKind, TelegramConfig};
use crate::error::BotError;
use async_trait::async_trait;
use drip_core::DripError;
use drip_economics::{LogNotifier, PayoutNotifier, PayoutRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const NOTIFY_TIMEOUT_SECS: u64 = 15;

fn http_client() -> Result<reqwest::Client, BotError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(NOTIFY_TIMEOUT_SECS))
        .build()
        .map_err(|e| BotError::ConfigError(format!("HTTP client: {}", e)))
}

/// POSTs each payout request as JSON
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, BotError> {
        Ok(Self {
            client: http_client()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl PayoutNotifier for WebhookNotifier {
    async fn notify(&self, request: &PayoutRequest) -> Result<(), DripError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| DripError::NotificationDeliveryFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DripError::NotificationDeliveryFailure(format!(
                "webhook returned {}",
                status
            )));
        }

        info!("Payout request {} delivered to webhook", request.request_id);
        Ok(())
    }
}

/// Sends the payout summary to an operator chat through the Bot API
pub struct TelegramOperatorNotifier {
    client: reqwest::Client,
    endpoint: String,
    chat_id: i64,
}

impl TelegramOperatorNotifier {
    pub fn new(telegram: &TelegramConfig, chat_id: i64) -> Result<Self, BotError> {
        let token = telegram
            .token
            .as_deref()
            .ok_or_else(|| BotError::ConfigError("telegram.token is not set".into()))?;

        Ok(Self {
            client: http_client()?,
            endpoint: bot_endpoint(&telegram.api_url, token),
            chat_id,
        })
    }
}

#[async_trait]
impl PayoutNotifier for TelegramOperatorNotifier {
    async fn notify(&self, request: &PayoutRequest) -> Result<(), DripError> {
        send_message(&self.client, &self.endpoint, self.chat_id, &request.summary())
            .await
            .map_err(|e| DripError::NotificationDeliveryFailure(e.to_string()))?;

        info!(
            "Payout request {} sent to operator chat {}",
            request.request_id, self.chat_id
        );
        Ok(())
    }
}

/// Build the notifier selected by `[notifier]`
pub fn build_notifier(
    notifier: &NotifierConfig,
    telegram: &TelegramConfig,
) -> Result<Arc<dyn PayoutNotifier>, BotError> {
    match notifier.kind {
        NotifierKind::Log => Ok(Arc::new(LogNotifier)),
        NotifierKind::Webhook => {
            let url = notifier
                .webhook_url
                .as_deref()
                .ok_or_else(|| BotError::ConfigError("notifier.webhook_url is not set".into()))?;
            Ok(Arc::new(WebhookNotifier::new(url)?))
        }
        NotifierKind::Telegram => {
            let chat_id = notifier.operator_chat_id.ok_or_else(|| {
                BotError::ConfigError("notifier.operator_chat_id is not set".into())
            })?;
            Ok(Arc::new(TelegramOperatorNotifier::new(telegram, chat_id)?))
        }
    }
}
