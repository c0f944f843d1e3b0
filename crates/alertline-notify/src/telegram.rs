//! Telegram Bot API notification channel.
//!
//! Alerts go out as HTML messages with an inline keyboard; button presses
//! come back as `callback_query` updates fetched with `getUpdates`.

use std::sync::atomic::{AtomicI64, Ordering};

use ::async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::time::Duration;
use tracing::{debug, error, info};

use alertline_core::config::resolve_secret;
use alertline_core::{AlertlineError, MessageHandle, NotificationPayload, Result, TelegramConfig};

use crate::channel::{ActionUpdate, NotificationChannel};

/// Telegram bot bound to a single chat.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
    bot_token: String,
    /// One past the highest update id already handed out
    next_offset: AtomicI64,
}

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct BotResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    from: Option<User>,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    #[serde(default)]
    text: Option<String>,
}

impl TelegramChannel {
    /// Create a channel, reading the bot token from `config.bot_token_env`.
    pub fn from_config(config: TelegramConfig) -> Result<Self> {
        let token = resolve_secret(&config.bot_token_env)?;
        Self::with_token(config, token)
    }

    /// Create a channel with an explicit bot token.
    pub fn with_token(config: TelegramConfig, bot_token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            bot_token: bot_token.into(),
            next_offset: AtomicI64::new(0),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.bot_token,
            method
        )
    }

    /// POST a JSON body to a Bot API method and unwrap the envelope.
    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<Option<T>> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await?;
        Self::unwrap_response(method, response).await
    }

    async fn unwrap_response<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<Option<T>> {
        let status = response.status().as_u16();
        let text = response.text().await?;

        match serde_json::from_str::<BotResponse<T>>(&text) {
            Ok(envelope) if envelope.ok => Ok(envelope.result),
            Ok(envelope) => Err(AlertlineError::channel(format!(
                "{method}: {}",
                envelope
                    .description
                    .unwrap_or_else(|| format!("HTTP {status}"))
            ))),
            Err(_) if !(200..300).contains(&status) => {
                Err(AlertlineError::from_http_status(method, status, &text))
            }
            Err(e) => Err(AlertlineError::parse(method, e.to_string())),
        }
    }

    fn inline_keyboard(payload: &NotificationPayload) -> Value {
        let row: Vec<Value> = payload
            .buttons()
            .into_iter()
            .map(|(label, data)| json!({ "text": label, "callback_data": data }))
            .collect();
        json!({ "inline_keyboard": [row] })
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    async fn send(&self, payload: &NotificationPayload) -> Result<MessageHandle> {
        let body = json!({
            "chat_id": self.config.chat_id,
            "text": payload.text,
            "parse_mode": "HTML",
            "reply_markup": Self::inline_keyboard(payload),
        });

        let sent: Option<SentMessage> = self.call("sendMessage", &body).await?;
        let sent = sent.ok_or_else(|| AlertlineError::parse("sendMessage", "missing result"))?;

        info!(
            message_id = sent.message_id,
            alert_id = %payload.alert_id,
            "Message sent to Telegram"
        );
        Ok(MessageHandle(sent.message_id))
    }

    async fn edit(&self, message: MessageHandle, text: &str, remove_buttons: bool) -> Result<()> {
        let mut body = json!({
            "chat_id": self.config.chat_id,
            "message_id": message.0,
            "text": text,
            "parse_mode": "HTML",
        });
        if remove_buttons {
            body["reply_markup"] = json!({ "inline_keyboard": [] });
        }

        self.call::<Value>("editMessageText", &body).await?;
        info!(message_id = message.0, "Message edited");
        Ok(())
    }

    async fn poll_actions(&self) -> Result<Vec<ActionUpdate>> {
        let offset = self.next_offset.load(Ordering::SeqCst);
        let mut request = self.client.get(self.method_url("getUpdates"));
        if offset > 0 {
            request = request.query(&[("offset", offset)]);
        }

        let response = request.send().await?;
        let updates: Vec<Update> = Self::unwrap_response("getUpdates", response)
            .await?
            .unwrap_or_default();

        if let Some(max_id) = updates.iter().map(|u| u.update_id).max() {
            self.next_offset.fetch_max(max_id + 1, Ordering::SeqCst);
        }

        let actions: Vec<ActionUpdate> = updates
            .into_iter()
            .filter_map(|update| {
                let query = update.callback_query?;
                Some(ActionUpdate {
                    update_id: update.update_id,
                    callback_data: query.data.unwrap_or_default(),
                    message: query.message.as_ref().map(|m| MessageHandle(m.message_id)),
                    message_text: query.message.and_then(|m| m.text).unwrap_or_default(),
                    user_id: query.from.map(|u| u.id),
                })
            })
            .collect();

        debug!(
            count = actions.len(),
            next_offset = self.next_offset.load(Ordering::SeqCst),
            "polled Telegram updates"
        );
        Ok(actions)
    }

    async fn send_error(&self, text: &str) -> Result<()> {
        let body = json!({
            "chat_id": self.config.chat_id,
            "text": text,
            "parse_mode": "HTML",
        });

        match self.call::<Value>("sendMessage", &body).await {
            Ok(_) => {
                info!("Error message sent to Telegram");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to send error message to Telegram");
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
