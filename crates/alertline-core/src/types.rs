//! Shared type definitions used across alertline crates.
//!
//! Alerts arrive from the backend as [`AlertRecord`]s, leave as
//! [`NotificationPayload`]s, and come back from the chat channel as
//! [`CallbackData`] carried by an action button.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Stable identifier of one alert instance.
pub type AlertId = String;

/// Identifier of the thread an alert belongs to (dismissal target).
pub type ThreadId = String;

/// Alert severity. The backend only distinguishes critical from the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", from = "Option<String>")]
pub enum Severity {
    /// Needs attention now
    Critical,
    /// Everything that is not critical
    #[default]
    Trivial,
}

impl From<Option<String>> for Severity {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            Some(s) if s.eq_ignore_ascii_case("critical") => Self::Critical,
            _ => Self::Trivial,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::Trivial => write!(f, "trivial"),
        }
    }
}

/// One open alert as reported by the alert backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Alert identifier (dedup and ledger key)
    #[serde(deserialize_with = "string_or_number")]
    pub id: AlertId,

    /// Thread identifier
    #[serde(rename = "threadID", deserialize_with = "string_or_number")]
    pub thread_id: ThreadId,

    #[serde(default)]
    pub severity: Severity,

    #[serde(default)]
    pub customer: String,

    #[serde(default)]
    pub environment: String,

    #[serde(default)]
    pub subject: String,
}

impl AlertRecord {
    /// Create a record with empty display fields.
    pub fn new(id: impl Into<AlertId>, thread_id: impl Into<ThreadId>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            severity,
            customer: String::new(),
            environment: String::new(),
            subject: String::new(),
        }
    }

    /// Set customer and environment.
    pub fn with_origin(mut self, customer: impl Into<String>, environment: impl Into<String>) -> Self {
        self.customer = customer.into();
        self.environment = environment.into();
        self
    }

    /// Set the subject line.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Backend ids show up as either JSON strings or integers.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Int(i64),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Text(s) => s,
        Repr::Int(n) => n.to_string(),
    })
}

/// Operator action offered on every alert message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Dismiss,
    Escalate,
}

impl ActionKind {
    /// Wire name used inside callback data.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dismiss => "dismiss",
            Self::Escalate => "escalate",
        }
    }

    /// Button label shown to the operator.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Dismiss => "Dismiss",
            Self::Escalate => "Escalate",
        }
    }

    /// Terminal disposition recorded once the action succeeds remotely.
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Dismiss => Disposition::Dismissed,
            Self::Escalate => Disposition::Escalated,
        }
    }

    fn from_wire(s: &str) -> Option<Self> {
        match s {
            "dismiss" => Some(Self::Dismiss),
            "escalate" => Some(Self::Escalate),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of an alert the operator acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Dismissed,
    Escalated,
}

impl Disposition {
    /// Confirmation sentence appended to the edited chat message.
    pub fn confirmation(&self) -> &'static str {
        match self {
            Self::Dismissed => "The alert has been dismissed.",
            Self::Escalated => "The alert has been escalated.",
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dismissed => write!(f, "dismissed"),
            Self::Escalated => write!(f, "escalated"),
        }
    }
}

/// Callback data could not be parsed into an action triple.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed callback data {raw:?}: {reason}")]
pub struct MalformedCallback {
    pub raw: String,
    pub reason: &'static str,
}

/// Payload carried by an action button: `action:threadId:alertId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallbackData {
    pub action: ActionKind,
    pub thread_id: ThreadId,
    pub alert_id: AlertId,
}

impl CallbackData {
    pub fn new(action: ActionKind, thread_id: impl Into<ThreadId>, alert_id: impl Into<AlertId>) -> Self {
        Self {
            action,
            thread_id: thread_id.into(),
            alert_id: alert_id.into(),
        }
    }

    /// Parse `action:threadId:alertId`. Exactly three non-empty fields.
    pub fn parse(raw: &str) -> std::result::Result<Self, MalformedCallback> {
        let malformed = |reason| MalformedCallback {
            raw: raw.to_string(),
            reason,
        };

        let parts: Vec<&str> = raw.split(':').collect();
        let [action, thread_id, alert_id] = parts.as_slice() else {
            return Err(malformed("expected three ':'-separated fields"));
        };
        if thread_id.is_empty() || alert_id.is_empty() {
            return Err(malformed("empty identifier"));
        }
        let action = ActionKind::from_wire(action).ok_or_else(|| malformed("unknown action"))?;

        Ok(Self::new(action, *thread_id, *alert_id))
    }

    /// Encode back to the wire form.
    pub fn encode(&self) -> String {
        format!("{}:{}:{}", self.action, self.thread_id, self.alert_id)
    }
}

impl std::fmt::Display for CallbackData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Channel-side identifier of a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHandle(pub i64);

impl std::fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provider-side identifier of a placed voice call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallHandle(pub String);

impl std::fmt::Display for CallHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rendered alert ready for delivery, with the ids its buttons point at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Rich text (HTML subset) body
    pub text: String,
    pub thread_id: ThreadId,
    pub alert_id: AlertId,
}

impl NotificationPayload {
    /// Callback data for one of the message's buttons.
    pub fn callback(&self, action: ActionKind) -> CallbackData {
        CallbackData::new(action, self.thread_id.clone(), self.alert_id.clone())
    }

    /// Buttons in display order: escalate first, then dismiss.
    pub fn buttons(&self) -> [(&'static str, String); 2] {
        [ActionKind::Escalate, ActionKind::Dismiss]
            .map(|action| (action.label(), self.callback(action).encode()))
    }
}
