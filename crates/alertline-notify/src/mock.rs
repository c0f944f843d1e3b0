//! Recording channel and voice doubles.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use ::async_trait::async_trait;
use tokio::sync::Mutex;

use alertline_core::{AlertlineError, CallHandle, MessageHandle, NotificationPayload, Result};

use crate::channel::{ActionUpdate, NotificationChannel};
use crate::voice::VoiceNotifier;

/// One recorded `edit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRecord {
    pub message: MessageHandle,
    pub text: String,
    pub remove_buttons: bool,
}

/// Mock chat channel.
///
/// Hands out increasing message handles, records everything it is asked to
/// deliver, and replays queued action updates on the next poll.
pub struct MockChannel {
    sent: Mutex<Vec<(MessageHandle, NotificationPayload)>>,
    edits: Mutex<Vec<EditRecord>>,
    errors: Mutex<Vec<String>>,
    pending_updates: Mutex<VecDeque<ActionUpdate>>,
    next_message_id: AtomicI64,
    next_update_id: AtomicI64,
    fail_sends: AtomicBool,
    fail_next_poll: AtomicBool,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            pending_updates: Mutex::new(VecDeque::new()),
            next_message_id: AtomicI64::new(100),
            next_update_id: AtomicI64::new(1),
            fail_sends: AtomicBool::new(false),
            fail_next_poll: AtomicBool::new(false),
        }
    }

    /// Queue a button press to be returned by the next `poll_actions`.
    pub async fn press(&self, callback_data: impl Into<String>, message: Option<MessageHandle>) {
        let update = ActionUpdate {
            update_id: self.next_update_id.fetch_add(1, Ordering::SeqCst),
            callback_data: callback_data.into(),
            message,
            message_text: String::new(),
            user_id: Some(1),
        };
        self.pending_updates.lock().await.push_back(update);
    }

    /// Queue a fully specified update.
    pub async fn push_update(&self, update: ActionUpdate) {
        self.pending_updates.lock().await.push_back(update);
    }

    /// Make `send` fail until switched back.
    pub fn set_sends_failing(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }

    /// Fail the next `poll_actions` with a transient error.
    pub fn fail_next_poll(&self) {
        self.fail_next_poll.store(true, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<(MessageHandle, NotificationPayload)> {
        self.sent.lock().await.clone()
    }

    pub async fn edits(&self) -> Vec<EditRecord> {
        self.edits.lock().await.clone()
    }

    pub async fn errors(&self) -> Vec<String> {
        self.errors.lock().await.clone()
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationChannel for MockChannel {
    async fn send(&self, payload: &NotificationPayload) -> Result<MessageHandle> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(AlertlineError::channel("mock send failure"));
        }
        let handle = MessageHandle(self.next_message_id.fetch_add(1, Ordering::SeqCst));
        self.sent.lock().await.push((handle, payload.clone()));
        Ok(handle)
    }

    async fn edit(&self, message: MessageHandle, text: &str, remove_buttons: bool) -> Result<()> {
        self.edits.lock().await.push(EditRecord {
            message,
            text: text.to_string(),
            remove_buttons,
        });
        Ok(())
    }

    async fn poll_actions(&self) -> Result<Vec<ActionUpdate>> {
        if self.fail_next_poll.swap(false, Ordering::SeqCst) {
            return Err(AlertlineError::channel("mock poll failure"));
        }
        Ok(self.pending_updates.lock().await.drain(..).collect())
    }

    async fn send_error(&self, text: &str) -> Result<()> {
        self.errors.lock().await.push(text.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Mock voice notifier that records call texts.
#[derive(Default)]
pub struct MockVoice {
    calls: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MockVoice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make calls fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Texts of every call placed.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl VoiceNotifier for MockVoice {
    async fn trigger_voice_alert(&self, text: &str) -> Result<CallHandle> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AlertlineError::voice("mock call failure"));
        }
        let mut calls = self.calls.lock().await;
        calls.push(text.to_string());
        Ok(CallHandle(format!("CA{:04}", calls.len())))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
