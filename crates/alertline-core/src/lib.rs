//! # alertline-core
//!
//! Core types, errors, and utilities shared by the alertline crates.
//!
//! This crate provides:
//! - [`AlertlineError`] - Error taxonomy for every alertline operation
//! - [`logging`] - Tracing setup with a daily-rotated file sink
//! - [`types`] - Alert records, actions, dispositions and message handles
//! - [`config`] - YAML configuration loaded once at startup
//! - [`markup`] - Escaping for HTML messages and TwiML
//!
//! ## Example
//!
//! ```no_run
//! use alertline_core::{AlertlineConfig, logging};
//!
//! fn main() -> alertline_core::Result<()> {
//!     let _guard = logging::init_logging(None, false)?;
//!
//!     let config = AlertlineConfig::load(&AlertlineConfig::default_path()?)?;
//!     tracing::info!(chat_id = %config.telegram.chat_id, "configuration loaded");
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod markup;
pub mod types;

// Re-export main types for convenience
pub use config::{
    AlertlineConfig, AuroraConfig, DEFAULT_VOICE_MESSAGE, LoggingConfig, ScheduleConfig,
    TelegramConfig, TwilioConfig,
};
pub use error::{AlertlineError, Result};
pub use logging::{LogGuard, init_logging};
pub use markup::escape_markup;
pub use types::{
    ActionKind, AlertId, AlertRecord, CallHandle, CallbackData, Disposition, MessageHandle,
    NotificationPayload, Severity, ThreadId,
};
