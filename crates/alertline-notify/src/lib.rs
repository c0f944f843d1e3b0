//! # alertline-notify
//!
//! Operator-facing notification channels.
//!
//! This crate provides:
//! - [`NotificationChannel`] - Chat channel with action buttons and callbacks
//! - [`TelegramChannel`] - Telegram Bot API implementation (reqwest)
//! - [`VoiceNotifier`] - Voice call escalation
//! - [`TwilioCaller`] - Twilio programmable voice implementation (reqwest)
//! - [`MockChannel`], [`MockVoice`] - Recording doubles for tests
//!
//! ## Example
//!
//! ```no_run
//! use alertline_core::TelegramConfig;
//! use alertline_notify::{NotificationChannel, TelegramChannel};
//!
//! # async fn example() -> alertline_core::Result<()> {
//! let channel = TelegramChannel::from_config(TelegramConfig::default())?;
//!
//! for update in channel.poll_actions().await? {
//!     println!("{} pressed {}", update.user_id.unwrap_or_default(), update.callback_data);
//! }
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod mock;
pub mod telegram;
pub mod voice;

pub use channel::{ActionUpdate, NotificationChannel};
pub use mock::{EditRecord, MockChannel, MockVoice};
pub use telegram::TelegramChannel;
pub use voice::{TwilioCaller, VoiceNotifier};
