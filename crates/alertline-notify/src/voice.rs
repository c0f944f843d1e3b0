//! Voice call escalation.

use ::async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Duration;
use tracing::{error, warn};

use alertline_core::config::resolve_secret;
use alertline_core::{AlertlineError, CallHandle, Result, TwilioConfig, escape_markup};

/// Places a phone call that reads a short message to the operator.
#[async_trait]
pub trait VoiceNotifier: Send + Sync {
    /// Start a call speaking `text`. Returns the provider's call id.
    async fn trigger_voice_alert(&self, text: &str) -> Result<CallHandle>;

    /// Notifier name for logging.
    fn name(&self) -> &str;
}

/// Twilio programmable voice caller.
pub struct TwilioCaller {
    config: TwilioConfig,
    client: reqwest::Client,
    auth_token: String,
}

#[derive(Debug, Deserialize)]
struct CallResource {
    sid: String,
}

impl TwilioCaller {
    /// Create a caller, reading the auth token from `config.auth_token_env`.
    pub fn from_config(config: TwilioConfig) -> Result<Self> {
        let token = resolve_secret(&config.auth_token_env)?;
        Self::with_auth_token(config, token)
    }

    /// Create a caller with an explicit auth token.
    pub fn with_auth_token(config: TwilioConfig, auth_token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            auth_token: auth_token.into(),
        })
    }

    /// Message spoken by default.
    pub fn default_message(&self) -> &str {
        &self.config.message
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

/// TwiML document that speaks `text` once.
pub fn say_twiml(text: &str) -> String {
    format!("<Response><Say>{}</Say></Response>", escape_markup(text))
}

#[async_trait]
impl VoiceNotifier for TwilioCaller {
    async fn trigger_voice_alert(&self, text: &str) -> Result<CallHandle> {
        let twiml = say_twiml(text);
        let form = [
            ("To", self.config.phone_to.as_str()),
            ("From", self.config.phone_from.as_str()),
            ("Twiml", twiml.as_str()),
        ];

        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.config.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, "Twilio refused the call");
            return Err(AlertlineError::voice(format!("HTTP {status}: {body}")));
        }

        let call: CallResource = response
            .json()
            .await
            .map_err(|e| AlertlineError::parse("twilio call resource", e.to_string()))?;

        warn!(call_sid = %call.sid, "Call initiated");
        Ok(CallHandle(call.sid))
    }

    fn name(&self) -> &str {
        "twilio"
    }
}
