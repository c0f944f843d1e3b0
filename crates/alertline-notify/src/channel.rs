//! The [`NotificationChannel`] trait.

use ::async_trait::async_trait;
use serde::{Deserialize, Serialize};

use alertline_core::{MessageHandle, NotificationPayload, Result};

/// A button press delivered by the chat channel.
///
/// `callback_data` is passed through raw; parsing it is the tracker's job so
/// malformed payloads are rejected in one place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionUpdate {
    /// Channel-side sequence number of the update
    pub update_id: i64,

    /// Raw button payload
    pub callback_data: String,

    /// Message the button belongs to, if the channel still knows it
    pub message: Option<MessageHandle>,

    /// Plain text of that message
    pub message_text: String,

    /// Operator who pressed the button
    pub user_id: Option<i64>,
}

/// Chat channel that carries alert messages and their action buttons.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver a rendered alert with dismiss/escalate buttons.
    async fn send(&self, payload: &NotificationPayload) -> Result<MessageHandle>;

    /// Replace a message's text, optionally stripping its buttons.
    async fn edit(&self, message: MessageHandle, text: &str, remove_buttons: bool) -> Result<()>;

    /// Button presses received since the previous poll.
    async fn poll_actions(&self) -> Result<Vec<ActionUpdate>>;

    /// Plain message without buttons, used to report alertline's own failures.
    async fn send_error(&self, text: &str) -> Result<()>;

    /// Channel name for logging.
    fn name(&self) -> &str;
}
