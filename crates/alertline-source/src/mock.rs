//! Scriptable in-memory alert source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};

use ::async_trait::async_trait;
use tokio::sync::Mutex;

use alertline_core::{AlertId, AlertRecord, AlertlineError, Result, ThreadId};

use crate::source::AlertSource;

/// Mock source for testing.
///
/// Serves whatever open-alert set was last configured and records every
/// remote action it receives. Failures can be switched on per operation.
#[derive(Default)]
pub struct MockAlertSource {
    open_alerts: Mutex<Vec<AlertRecord>>,
    descriptions: Mutex<HashMap<ThreadId, String>>,
    dismissed: Mutex<Vec<ThreadId>>,
    escalated: Mutex<Vec<AlertId>>,
    authenticated: AtomicBool,
    reject_login: AtomicBool,
    fail_next_fetch: AtomicBool,
    fetch_status: AtomicU16,
    actions_status: AtomicU16,
    login_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    action_calls: AtomicUsize,
}

impl MockAlertSource {
    /// Create a source that still requires `authenticate`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source that is already logged in.
    pub fn authenticated() -> Self {
        let source = Self::default();
        source.authenticated.store(true, Ordering::SeqCst);
        source
    }

    /// Make `authenticate` fail.
    pub fn with_rejected_login(self) -> Self {
        self.reject_login.store(true, Ordering::SeqCst);
        self
    }

    /// Drop the session, as if the backend expired it.
    pub fn expire_session(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
    }

    /// Replace the open-alert set served by `fetch_open_alerts`.
    pub async fn set_open_alerts(&self, alerts: Vec<AlertRecord>) {
        *self.open_alerts.lock().await = alerts;
    }

    /// Register a thread description.
    pub async fn set_description(&self, thread_id: impl Into<ThreadId>, body: impl Into<String>) {
        self.descriptions
            .lock()
            .await
            .insert(thread_id.into(), body.into());
    }

    /// Fail the next `fetch_open_alerts` with a transient error.
    pub fn fail_next_fetch(&self) {
        self.fail_next_fetch.store(true, Ordering::SeqCst);
    }

    /// Answer every `fetch_open_alerts` with this HTTP status; 0 clears it.
    pub fn set_fetch_status(&self, status: u16) {
        self.fetch_status.store(status, Ordering::SeqCst);
    }

    /// Make `dismiss` and `escalate` fail with a 503 until switched back.
    pub fn set_actions_failing(&self, failing: bool) {
        self.set_actions_status(if failing { 503 } else { 0 });
    }

    /// Answer every `dismiss` and `escalate` with this HTTP status; 0 clears it.
    pub fn set_actions_status(&self, status: u16) {
        self.actions_status.store(status, Ordering::SeqCst);
    }

    /// Thread ids dismissed so far.
    pub async fn dismissed(&self) -> Vec<ThreadId> {
        self.dismissed.lock().await.clone()
    }

    /// Alert ids escalated so far.
    pub async fn escalated(&self) -> Vec<AlertId> {
        self.escalated.lock().await.clone()
    }

    /// Number of `authenticate` calls, successful or not.
    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch_open_alerts` calls.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of remote actions that reached the source, successful or not.
    pub fn action_calls(&self) -> usize {
        self.action_calls.load(Ordering::SeqCst)
    }

    fn ensure_authenticated(&self) -> Result<()> {
        if self.authenticated.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AlertlineError::NotAuthenticated)
        }
    }

    fn check_action(&self, what: &str) -> Result<()> {
        self.ensure_authenticated()?;
        self.action_calls.fetch_add(1, Ordering::SeqCst);
        match self.actions_status.load(Ordering::SeqCst) {
            0 => Ok(()),
            status => Err(AlertlineError::from_http_status(what, status, "mock failure")),
        }
    }
}

#[async_trait]
impl AlertSource for MockAlertSource {
    async fn authenticate(&self) -> Result<()> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_login.load(Ordering::SeqCst) {
            return Err(AlertlineError::authentication("mock login rejected"));
        }
        self.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_open_alerts(&self) -> Result<Vec<AlertRecord>> {
        self.ensure_authenticated()?;
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_fetch.swap(false, Ordering::SeqCst) {
            return Err(AlertlineError::parse("alert list", "mock failure"));
        }
        match self.fetch_status.load(Ordering::SeqCst) {
            0 => {}
            status => return Err(AlertlineError::from_http_status("get_alerts", status, "")),
        }
        Ok(self.open_alerts.lock().await.clone())
    }

    async fn fetch_description(&self, thread_id: &str) -> Result<Option<String>> {
        self.ensure_authenticated()?;
        Ok(self.descriptions.lock().await.get(thread_id).cloned())
    }

    async fn dismiss(&self, thread_id: &str) -> Result<()> {
        self.check_action("dismiss_thread")?;
        self.dismissed.lock().await.push(thread_id.to_string());
        Ok(())
    }

    async fn escalate(&self, alert_id: &str) -> Result<()> {
        self.check_action("escalate_alert")?;
        self.escalated.lock().await.push(alert_id.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
