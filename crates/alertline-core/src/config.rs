//! Configuration loaded once at startup.
//!
//! The YAML file names every endpoint and identity, but never a secret:
//! passwords and tokens are read from the environment variables the file
//! points at (`password_env`, `bot_token_env`, `auth_token_env`).
//!
//! ```yaml
//! aurora:
//!   username: oncall
//! telegram:
//!   chat_id: "-100123456"
//! twilio:
//!   account_sid: AC0123
//!   phone_to: "+15550001"
//!   phone_from: "+15550002"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AlertlineError, Result};

/// Top-level alertline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertlineConfig {
    pub aurora: AuroraConfig,
    pub telegram: TelegramConfig,
    pub twilio: TwilioConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
}

/// Aurora alert backend connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuroraConfig {
    pub base_url: String,
    pub username: String,
    /// Environment variable holding the password
    pub password_env: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AuroraConfig {
    fn default() -> Self {
        Self {
            base_url: "https://aurora.onetick.com".to_string(),
            username: String::new(),
            password_env: "AURORA_PASSWORD".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Telegram bot used as the notification channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_base_url: String,
    /// Environment variable holding the bot token
    pub bot_token_env: String,
    pub chat_id: String,
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.telegram.org".to_string(),
            bot_token_env: "TELEGRAM_BOT_TOKEN".to_string(),
            chat_id: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Sentence spoken on an escalation call unless configured otherwise.
pub const DEFAULT_VOICE_MESSAGE: &str = "Alert! Something is wrong on the server!";

/// Twilio account used for voice alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub api_base_url: String,
    pub account_sid: String,
    /// Environment variable holding the auth token
    pub auth_token_env: String,
    pub phone_to: String,
    pub phone_from: String,
    /// Sentence spoken when the call is answered
    pub message: String,
    pub timeout_secs: u64,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.twilio.com".to_string(),
            account_sid: String::new(),
            auth_token_env: "TWILIO_AUTH_TOKEN".to_string(),
            phone_to: String::new(),
            phone_from: String::new(),
            message: DEFAULT_VOICE_MESSAGE.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Polling cadences, all in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Loop tick
    pub tick_secs: u64,
    /// Interval between chat action polls
    pub action_poll_secs: u64,
    /// Lower bound of the randomized alert poll interval
    pub alert_poll_min_secs: u64,
    /// Upper bound of the randomized alert poll interval
    pub alert_poll_max_secs: u64,
    /// Delay before the first alert poll
    pub initial_alert_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick_secs: 1,
            action_poll_secs: 3,
            alert_poll_min_secs: 45,
            alert_poll_max_secs: 75,
            initial_alert_delay_secs: 1,
        }
    }
}

/// Log sink settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Defaults to `~/.alertline/logs`
    pub directory: Option<PathBuf>,
    pub verbose: bool,
}

impl AlertlineConfig {
    /// Default config path, `~/.alertline/config.yaml`.
    pub fn default_path() -> Result<PathBuf> {
        let home =
            dirs::home_dir().ok_or_else(|| AlertlineError::internal("home directory not found"))?;
        Ok(home.join(".alertline").join("config.yaml"))
    }

    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AlertlineError::config_not_found_with_source(path, e))?;
        let config = Self::from_yaml(&content).map_err(|e| match e {
            AlertlineError::ConfigInvalid { message, .. } => AlertlineError::ConfigInvalid {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| AlertlineError::ConfigInvalid {
                path: PathBuf::from("<inline>"),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and interval sanity.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("aurora.base_url", &self.aurora.base_url),
            ("aurora.username", &self.aurora.username),
            ("telegram.chat_id", &self.telegram.chat_id),
            ("twilio.account_sid", &self.twilio.account_sid),
            ("twilio.phone_to", &self.twilio.phone_to),
            ("twilio.phone_from", &self.twilio.phone_from),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(AlertlineError::validation(format!("{field} must be set")));
        }

        let s = &self.schedule;
        if s.tick_secs == 0 || s.action_poll_secs == 0 || s.alert_poll_min_secs == 0 {
            return Err(AlertlineError::validation(
                "schedule intervals must be greater than zero",
            ));
        }
        if s.alert_poll_min_secs > s.alert_poll_max_secs {
            return Err(AlertlineError::validation(format!(
                "schedule.alert_poll_min_secs ({}) exceeds alert_poll_max_secs ({})",
                s.alert_poll_min_secs, s.alert_poll_max_secs
            )));
        }

        Ok(())
    }
}

/// Read a secret from the named environment variable.
pub fn resolve_secret(env: &str) -> Result<String> {
    match std::env::var(env) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(AlertlineError::MissingCredential {
            env: env.to_string(),
        }),
    }
}
