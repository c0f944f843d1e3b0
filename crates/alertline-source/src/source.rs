//! The [`AlertSource`] trait.

use ::async_trait::async_trait;

use alertline_core::{AlertRecord, Result};

/// Remote alerting backend.
///
/// `authenticate` must succeed before any other call. The two remote
/// actions key on different identifiers: dismissal closes a whole thread,
/// escalation targets one alert.
#[async_trait]
pub trait AlertSource: Send + Sync {
    /// Log in and keep the session for subsequent calls.
    async fn authenticate(&self) -> Result<()>;

    /// Current full set of open alerts, in backend order.
    async fn fetch_open_alerts(&self) -> Result<Vec<AlertRecord>>;

    /// Main description of a thread, `None` when the backend has none.
    async fn fetch_description(&self, thread_id: &str) -> Result<Option<String>>;

    /// Dismiss every alert in a thread.
    async fn dismiss(&self, thread_id: &str) -> Result<()>;

    /// Escalate a single alert.
    async fn escalate(&self, alert_id: &str) -> Result<()>;

    /// Source name for logging.
    fn name(&self) -> &str;
}
