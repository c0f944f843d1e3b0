//! Rendering of alerts and acknowledgements for the chat channel.
//!
//! The channel parses messages as an HTML subset, so free text coming from
//! the backend is escaped before it is embedded.

use chrono::{DateTime, Utc};

use alertline_core::{AlertRecord, Disposition, NotificationPayload, Severity, escape_markup};

/// Maximum number of description characters shown in a message.
pub const DESCRIPTION_LIMIT: usize = 100;

/// Maximum number of original-message characters quoted in an acknowledgement.
pub const SNIPPET_LIMIT: usize = 100;

/// Shown when the backend has no description for a thread.
pub const NO_DESCRIPTION: &str = "No description available";

/// Render an alert into a message carrying its button ids.
pub fn render(alert: &AlertRecord, description: Option<&str>) -> NotificationPayload {
    let description = match description.map(str::trim) {
        Some(text) if !text.is_empty() => truncate_chars(text, DESCRIPTION_LIMIT),
        _ => NO_DESCRIPTION,
    };
    let description = escape_markup(description);

    let text = match alert.severity {
        Severity::Critical => format!(
            "<b>Critical</b> 🔴 {}:{} - {}\n{}\n",
            alert.customer, alert.environment, alert.subject, description
        ),
        Severity::Trivial => format!(
            "<b>Trivial</b> 🟡 {} : {} \n{}\n{}\n",
            alert.customer, alert.environment, alert.subject, description
        ),
    };

    NotificationPayload {
        text,
        thread_id: alert.thread_id.clone(),
        alert_id: alert.id.clone(),
    }
}

/// Replacement text for a message whose alert was acted on.
pub fn acknowledgement(disposition: Disposition, at: DateTime<Utc>, original: &str) -> String {
    let snippet = truncate_chars(original, SNIPPET_LIMIT);
    let ellipsis = if snippet.len() < original.len() { "..." } else { "" };

    format!(
        "{} [Updated at {}] - Alert: {}{}",
        disposition.confirmation(),
        at.format("%Y-%m-%d %H:%M:%S"),
        escape_markup(snippet),
        ellipsis
    )
}

/// Longest prefix of `text` with at most `limit` characters.
fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
