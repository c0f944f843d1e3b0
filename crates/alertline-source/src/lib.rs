//! # alertline-source
//!
//! Access to the alert backend.
//!
//! This crate provides:
//! - [`AlertSource`] - Trait the orchestrator and tracker talk to
//! - [`AuroraClient`] - HTTP client for the Aurora alert backend (reqwest)
//! - [`MockAlertSource`] - Scriptable source for tests and dry runs
//!
//! ## Example
//!
//! ```no_run
//! use alertline_core::AuroraConfig;
//! use alertline_source::{AlertSource, AuroraClient};
//!
//! # async fn example() -> alertline_core::Result<()> {
//! let client = AuroraClient::with_password(AuroraConfig::default(), "secret")?;
//! client.authenticate().await?;
//!
//! for alert in client.fetch_open_alerts().await? {
//!     println!("{} {}", alert.id, alert.subject);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aurora;
pub mod mock;
pub mod source;

pub use aurora::AuroraClient;
pub use mock::MockAlertSource;
pub use source::AlertSource;
