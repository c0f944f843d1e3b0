//! # alertline-monitor
//!
//! Alert lifecycle and the polling loop.
//!
//! This crate provides:
//! - [`AlertTracker`] - Dedup set, action ledger and pending notifications
//! - [`formatter`] - Rendering of alerts and acknowledgements
//! - [`Cadence`] - Fixed and jittered poll intervals
//! - [`AlertMonitor`] - Single cooperative loop wiring source, chat and voice
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use alertline_core::ScheduleConfig;
//! use alertline_monitor::AlertMonitor;
//! use alertline_notify::{MockChannel, MockVoice};
//! use alertline_source::MockAlertSource;
//!
//! # async fn example() -> alertline_core::Result<()> {
//! let mut monitor = AlertMonitor::new(
//!     Arc::new(MockAlertSource::new()),
//!     Arc::new(MockChannel::new()),
//!     Arc::new(MockVoice::new()),
//!     ScheduleConfig::default(),
//! );
//! monitor.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod formatter;
pub mod monitor;
pub mod schedule;
pub mod tracker;

pub use monitor::{ActionReport, AlertMonitor, AlertReport, StopHandle, TickReport};
pub use schedule::{Cadence, IntervalPolicy};
pub use tracker::{Acknowledged, AlertTracker, PendingNotification, Rejection};
