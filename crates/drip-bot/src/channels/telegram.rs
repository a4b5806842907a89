//! Telegram Bot API transport (long polling)

use super::{ChatTransport, IncomingMessage, Reply};
use crate::config::TelegramConfig;
use crate::error::ChannelError;
use async_trait::async_trait;
use drip_core::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Headroom over the long-poll timeout before the HTTP client gives up
const HTTP_TIMEOUT_MARGIN_SECS: u64 = 10;

pub struct TelegramTransport {
    client: reqwest::Client,
    /// `<api_url>/bot<token>`
    endpoint: String,
    poll_timeout_secs: u64,
    /// Next update id to request
    offset: Mutex<i64>,
    pending: Mutex<VecDeque<IncomingMessage>>,
}

/// Bot API response envelope
#[derive(Deserialize)]
pub(crate) struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    pub(crate) fn into_result(self) -> Result<T, ChannelError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(ChannelError::Api(
                self.description
                    .unwrap_or_else(|| "request rejected".to_string()),
            )),
        }
    }
}

#[derive(Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<TelegramMessage>,
}

#[derive(Deserialize)]
struct TelegramMessage {
    #[serde(default)]
    from: Option<TelegramUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct TelegramUser {
    id: i64,
}

#[derive(Deserialize)]
struct BotUser {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct SendMessage<'a> {
    pub chat_id: i64,
    pub text: &'a str,
}

/// `<api_url>/bot<token>`
pub(crate) fn bot_endpoint(api_url: &str, token: &str) -> String {
    format!("{}/bot{}", api_url.trim_end_matches('/'), token)
}

/// POST `sendMessage`
pub(crate) async fn send_message(
    client: &reqwest::Client,
    endpoint: &str,
    chat_id: i64,
    text: &str,
) -> Result<(), ChannelError> {
    let response: ApiResponse<serde_json::Value> = client
        .post(format!("{}/sendMessage", endpoint))
        .json(&SendMessage { chat_id, text })
        .send()
        .await
        .map_err(|e| ChannelError::SendFailed(e.to_string()))?
        .json()
        .await
        .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

    response.into_result().map(|_| ())
}

impl TelegramTransport {
    pub fn new(config: &TelegramConfig) -> Result<Self, ChannelError> {
        let token = config
            .token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ChannelError::InvalidCredentials("telegram.token is not set".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(
                config.poll_timeout_secs + HTTP_TIMEOUT_MARGIN_SECS,
            ))
            .build()?;

        Ok(Self {
            client,
            endpoint: bot_endpoint(&config.api_url, token),
            poll_timeout_secs: config.poll_timeout_secs,
            offset: Mutex::new(0),
            pending: Mutex::new(VecDeque::new()),
        })
    }

    /// Bot username from `getMe`, for invite links
    pub async fn username(&self) -> Result<Option<String>, ChannelError> {
        let response: ApiResponse<BotUser> = self
            .client
            .get(format!("{}/getMe", self.endpoint))
            .send()
            .await?
            .json()
            .await?;

        Ok(response.into_result()?.username)
    }

    /// One `getUpdates` round; acknowledges everything it returns
    async fn poll(&self) -> Result<Vec<IncomingMessage>, ChannelError> {
        let mut offset = self.offset.lock().await;
        let response: ApiResponse<Vec<Update>> = self
            .client
            .get(format!("{}/getUpdates", self.endpoint))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.poll_timeout_secs.to_string()),
            ])
            .send()
            .await?
            .json()
            .await?;
        let updates = response.into_result()?;

        let mut messages = Vec::with_capacity(updates.len());
        for update in updates {
            *offset = (*offset).max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            match (message.from, message.text) {
                (Some(user), Some(text)) => {
                    messages.push(IncomingMessage::new(AccountId::new(user.id), text))
                }
                _ => debug!("Skipping non-text update {}", update.update_id),
            }
        }
        Ok(messages)
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn receive(&self) -> Result<Option<IncomingMessage>, ChannelError> {
        loop {
            if let Some(message) = self.pending.lock().await.pop_front() {
                return Ok(Some(message));
            }
            let batch = self.poll().await?;
            self.pending.lock().await.extend(batch);
        }
    }

    async fn send(&self, reply: Reply) -> Result<(), ChannelError> {
        send_message(
            &self.client,
            &self.endpoint,
            reply.account_id.get(),
            &reply.text,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_url: &str) -> TelegramConfig {
        TelegramConfig {
            token: Some("TOKEN".into()),
            api_url: api_url.to_string(),
            poll_timeout_secs: 0,
            ..TelegramConfig::default()
        }
    }

    #[test]
    fn test_missing_token_rejected() {
        let result = TelegramTransport::new(&TelegramConfig::default());
        assert!(matches!(result, Err(ChannelError::InvalidCredentials(_))));
    }

    #[test]
    fn test_bot_endpoint() {
        assert_eq!(
            bot_endpoint("https://api.telegram.org/", "123:abc"),
            "https://api.telegram.org/bot123:abc"
        );
    }

    #[tokio::test]
    async fn test_receive_text_updates_and_advance_offset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/botTOKEN/getUpdates"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {"update_id": 7, "message": {"from": {"id": 42}, "text": "/start 5"}},
                    {"update_id": 8, "message": {"from": {"id": 43}}},
                    {"update_id": 9, "message": {"from": {"id": 44}, "text": "/mine"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/botTOKEN/getUpdates"))
            .and(query_param("offset", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {"update_id": 10, "message": {"from": {"id": 42}, "text": "/ad"}}
                ]
            })))
            .mount(&server)
            .await;

        let transport = TelegramTransport::new(&config(&server.uri())).unwrap();

        assert_eq!(
            transport.receive().await.unwrap(),
            Some(IncomingMessage::new(AccountId::new(42), "/start 5"))
        );
        assert_eq!(
            transport.receive().await.unwrap(),
            Some(IncomingMessage::new(AccountId::new(44), "/mine"))
        );
        assert_eq!(
            transport.receive().await.unwrap(),
            Some(IncomingMessage::new(AccountId::new(42), "/ad"))
        );
    }

    #[tokio::test]
    async fn test_send_posts_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_json(json!({"chat_id": 42, "text": "hello"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = TelegramTransport::new(&config(&server.uri())).unwrap();
        transport
            .send(Reply::new(AccountId::new(42), "hello"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_api_error_surfaces_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(403).set_body_json(
                json!({"ok": false, "description": "Forbidden: bot was blocked by the user"}),
            ))
            .mount(&server)
            .await;

        let transport = TelegramTransport::new(&config(&server.uri())).unwrap();
        let err = transport
            .send(Reply::new(AccountId::new(42), "hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, ChannelError::Api(msg) if msg.contains("blocked")));
    }

    #[tokio::test]
    async fn test_username_from_get_me() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/botTOKEN/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"ok": true, "result": {"id": 1, "is_bot": true, "username": "drip_bot"}}),
            ))
            .mount(&server)
            .await;

        let transport = TelegramTransport::new(&config(&server.uri())).unwrap();
        assert_eq!(transport.username().await.unwrap(), Some("drip_bot".to_string()));
    }
}
