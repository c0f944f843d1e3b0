//! Alert lifecycle state: what has been surfaced and what has been acted on.
//!
//! The tracker owns three process-lifetime structures:
//!
//! - the **seen set** of alert ids already shown to the operator, cleared
//!   whenever the backend reports no open alerts at all;
//! - the **ledger** of terminal dispositions, keyed by alert id only, which
//!   makes every action at-most-once no matter how often a button press is
//!   delivered;
//! - the **pending** map from delivered message to the alert its buttons
//!   point at, consumed once the message is acknowledged.
//!
//! Nothing is persisted; a restart starts from empty state.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, info, warn};

use alertline_core::types::MalformedCallback;
use alertline_core::{
    ActionKind, AlertId, AlertRecord, AlertlineError, CallbackData, Disposition, MessageHandle,
    NotificationPayload, ThreadId,
};
use alertline_source::AlertSource;

/// Outcome of an accepted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledged {
    pub alert_id: AlertId,
    pub thread_id: ThreadId,
    pub disposition: Disposition,
}

/// Why an action was not applied.
#[derive(Debug, Error)]
pub enum Rejection {
    /// Callback payload is not an `action:threadId:alertId` triple
    #[error(transparent)]
    Malformed(#[from] MalformedCallback),

    /// The alert already has a ledger entry
    #[error("alert {alert_id} was already {disposition}")]
    AlreadyHandled {
        alert_id: AlertId,
        disposition: Disposition,
    },

    /// The backend call failed; the ledger is untouched so a retry can succeed
    #[error("{action} of alert {alert_id} failed: {source}")]
    RemoteFailure {
        alert_id: AlertId,
        action: ActionKind,
        #[source]
        source: AlertlineError,
    },
}

impl Rejection {
    /// Returns true for the benign duplicate-press case.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::AlreadyHandled { .. })
    }
}

/// Ids a delivered message's buttons point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotification {
    pub thread_id: ThreadId,
    pub alert_id: AlertId,
}

/// Dedup set, action ledger and pending notifications.
#[derive(Debug, Default)]
pub struct AlertTracker {
    seen: HashSet<AlertId>,
    ledger: HashMap<AlertId, Disposition>,
    pending: HashMap<MessageHandle, PendingNotification>,
}

impl AlertTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts in `open` that were not surfaced before, in input order.
    ///
    /// An empty `open` set means everything was cleared upstream and resets
    /// the seen set, so a reappearing id is reported again. Pending messages
    /// whose alert is no longer open are dropped either way.
    pub fn filter_new(&mut self, open: Vec<AlertRecord>) -> Vec<AlertRecord> {
        if open.is_empty() {
            if !self.seen.is_empty() {
                info!(forgotten = self.seen.len(), "No open alerts upstream; resetting seen set");
            }
            self.seen.clear();
            self.pending.clear();
            return Vec::new();
        }

        let open_ids: HashSet<&str> = open.iter().map(|alert| alert.id.as_str()).collect();
        let before = self.pending.len();
        self.pending
            .retain(|_, pending| open_ids.contains(pending.alert_id.as_str()));
        if self.pending.len() < before {
            debug!(
                dropped = before - self.pending.len(),
                "pending messages for closed alerts dropped"
            );
        }

        open.into_iter()
            .filter(|alert| self.seen.insert(alert.id.clone()))
            .collect()
    }

    /// Forget that an alert was surfaced, so the next poll reports it again.
    ///
    /// Used when delivery of a freshly seen alert failed.
    pub fn release(&mut self, alert_id: &str) -> bool {
        self.seen.remove(alert_id)
    }

    /// Parse a raw callback payload and apply it.
    pub async fn handle_callback(
        &mut self,
        source: &dyn AlertSource,
        raw: &str,
    ) -> Result<Acknowledged, Rejection> {
        let callback = CallbackData::parse(raw)?;
        self.apply(source, &callback).await
    }

    /// Apply an operator action at most once per alert.
    ///
    /// Dismissal is sent for the thread, escalation for the alert. The
    /// ledger is written only after the backend accepted the action.
    pub async fn apply_action(
        &mut self,
        source: &dyn AlertSource,
        action: ActionKind,
        thread_id: &str,
        alert_id: &str,
    ) -> Result<Acknowledged, Rejection> {
        self.apply(source, &CallbackData::new(action, thread_id, alert_id))
            .await
    }

    async fn apply(
        &mut self,
        source: &dyn AlertSource,
        callback: &CallbackData,
    ) -> Result<Acknowledged, Rejection> {
        let CallbackData {
            action,
            thread_id,
            alert_id,
        } = callback;

        if let Some(&disposition) = self.ledger.get(alert_id) {
            info!(%alert_id, %disposition, "Alert has already been handled");
            return Err(Rejection::AlreadyHandled {
                alert_id: alert_id.clone(),
                disposition,
            });
        }

        let outcome = match action {
            ActionKind::Dismiss => source.dismiss(thread_id).await,
            ActionKind::Escalate => source.escalate(alert_id).await,
        };

        if let Err(err) = outcome {
            warn!(%alert_id, %action, error = %err, "Remote action failed; leaving ledger untouched");
            return Err(Rejection::RemoteFailure {
                alert_id: alert_id.clone(),
                action: *action,
                source: err,
            });
        }

        let disposition = action.disposition();
        self.ledger.insert(alert_id.clone(), disposition);
        debug!(%alert_id, %disposition, ledger = self.ledger.len(), "ledger entry recorded");

        Ok(Acknowledged {
            alert_id: alert_id.clone(),
            thread_id: thread_id.clone(),
            disposition,
        })
    }

    /// Remember which alert a delivered message belongs to.
    pub fn record_sent(&mut self, message: MessageHandle, payload: &NotificationPayload) {
        self.pending.insert(
            message,
            PendingNotification {
                thread_id: payload.thread_id.clone(),
                alert_id: payload.alert_id.clone(),
            },
        );
    }

    /// Consume the pending entry of an acknowledged message.
    pub fn take_pending(&mut self, message: MessageHandle) -> Option<PendingNotification> {
        self.pending.remove(&message)
    }

    /// Terminal disposition of an alert, if any.
    pub fn disposition(&self, alert_id: &str) -> Option<Disposition> {
        self.ledger.get(alert_id).copied()
    }

    /// True while a delivered message still awaits an action.
    pub fn is_pending(&self, message: MessageHandle) -> bool {
        self.pending.contains_key(&message)
    }

    pub fn is_seen(&self, alert_id: &str) -> bool {
        self.seen.contains(alert_id)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn handled_count(&self) -> usize {
        self.ledger.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alertline_core::Severity;
    use alertline_source::MockAlertSource;

    fn alert(id: &str) -> AlertRecord {
        AlertRecord::new(id, format!("th-{id}"), Severity::Critical)
    }

    fn ids(alerts: &[AlertRecord]) -> Vec<&str> {
        alerts.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn test_filter_new_preserves_order_and_dedups() {
        let mut tracker = AlertTracker::new();

        let first = tracker.filter_new(vec![alert("3"), alert("1"), alert("2")]);
        assert_eq!(ids(&first), vec!["3", "1", "2"]);

        let second = tracker.filter_new(vec![alert("1"), alert("4"), alert("2")]);
        assert_eq!(ids(&second), vec!["4"]);
        assert_eq!(tracker.seen_count(), 4);
    }

    #[test]
    fn test_unchanged_open_set_yields_nothing_after_first_poll() {
        let mut tracker = AlertTracker::new();
        let open = vec![alert("1"), alert("2")];

        assert_eq!(tracker.filter_new(open.clone()).len(), 2);
        for _ in 0..5 {
            assert!(tracker.filter_new(open.clone()).is_empty());
        }
    }

    #[test]
    fn test_duplicate_ids_within_one_poll() {
        let mut tracker = AlertTracker::new();
        let new = tracker.filter_new(vec![alert("1"), alert("1")]);
        assert_eq!(ids(&new), vec!["1"]);
    }

    #[test]
    fn test_reset_on_empty_scenario() {
        let mut tracker = AlertTracker::new();

        assert_eq!(ids(&tracker.filter_new(vec![alert("1")])), vec!["1"]);
        assert!(tracker.filter_new(vec![alert("1")]).is_empty());
        assert!(tracker.filter_new(vec![]).is_empty());
        assert_eq!(tracker.seen_count(), 0);
        assert_eq!(ids(&tracker.filter_new(vec![alert("1")])), vec!["1"]);
    }

    #[test]
    fn test_release_makes_alert_new_again() {
        let mut tracker = AlertTracker::new();
        tracker.filter_new(vec![alert("1")]);

        assert!(tracker.release("1"));
        assert!(!tracker.is_seen("1"));
        assert_eq!(ids(&tracker.filter_new(vec![alert("1")])), vec!["1"]);
    }

    #[tokio::test]
    async fn test_action_is_applied_at_most_once() {
        let source = MockAlertSource::authenticated();
        let mut tracker = AlertTracker::new();

        let ack = tracker
            .apply_action(&source, ActionKind::Dismiss, "threadA", "alert1")
            .await
            .unwrap();
        assert_eq!(ack.disposition, Disposition::Dismissed);
        assert_eq!(ack.thread_id, "threadA");

        let second = tracker
            .apply_action(&source, ActionKind::Dismiss, "threadA", "alert1")
            .await
            .unwrap_err();
        assert!(second.is_duplicate());

        assert_eq!(source.action_calls(), 1);
        assert_eq!(source.dismissed().await, vec!["threadA".to_string()]);
    }

    #[tokio::test]
    async fn test_dismiss_keys_on_thread_escalate_on_alert() {
        let source = MockAlertSource::authenticated();
        let mut tracker = AlertTracker::new();

        tracker
            .apply_action(&source, ActionKind::Dismiss, "th-1", "a-1")
            .await
            .unwrap();
        tracker
            .apply_action(&source, ActionKind::Escalate, "th-2", "a-2")
            .await
            .unwrap();

        assert_eq!(source.dismissed().await, vec!["th-1".to_string()]);
        assert_eq!(source.escalated().await, vec!["a-2".to_string()]);
    }

    #[tokio::test]
    async fn test_dispositions_are_exclusive() {
        let source = MockAlertSource::authenticated();
        let mut tracker = AlertTracker::new();

        tracker
            .apply_action(&source, ActionKind::Dismiss, "th-1", "a-1")
            .await
            .unwrap();
        let err = tracker
            .apply_action(&source, ActionKind::Escalate, "th-1", "a-1")
            .await
            .unwrap_err();

        match err {
            Rejection::AlreadyHandled { disposition, .. } => {
                assert_eq!(disposition, Disposition::Dismissed)
            }
            other => panic!("expected AlreadyHandled, got {other:?}"),
        }
        assert!(source.escalated().await.is_empty());

        tracker
            .apply_action(&source, ActionKind::Escalate, "th-9", "a-9")
            .await
            .unwrap();
        assert!(
            tracker
                .apply_action(&source, ActionKind::Dismiss, "th-9", "a-9")
                .await
                .unwrap_err()
                .is_duplicate()
        );
        assert_eq!(tracker.disposition("a-9"), Some(Disposition::Escalated));
    }

    #[tokio::test]
    async fn test_failed_action_is_retryable() {
        let source = MockAlertSource::authenticated();
        let mut tracker = AlertTracker::new();

        source.set_actions_failing(true);
        let err = tracker
            .apply_action(&source, ActionKind::Escalate, "th-1", "a-1")
            .await
            .unwrap_err();
        assert!(matches!(err, Rejection::RemoteFailure { action: ActionKind::Escalate, .. }));
        assert_eq!(tracker.disposition("a-1"), None);

        source.set_actions_failing(false);
        let ack = tracker
            .apply_action(&source, ActionKind::Escalate, "th-1", "a-1")
            .await
            .unwrap();
        assert_eq!(ack.disposition, Disposition::Escalated);
        assert_eq!(source.action_calls(), 2);
    }

    #[tokio::test]
    async fn test_malformed_callback_rejected_before_lookup() {
        let source = MockAlertSource::authenticated();
        let mut tracker = AlertTracker::new();

        for raw in ["dismiss:only-two", "archive:th:a", ""] {
            let err = tracker.handle_callback(&source, raw).await.unwrap_err();
            assert!(matches!(err, Rejection::Malformed(_)), "{raw:?}");
        }
        assert_eq!(source.action_calls(), 0);
        assert_eq!(tracker.handled_count(), 0);
    }

    #[tokio::test]
    async fn test_handle_callback_parses_and_applies() {
        let source = MockAlertSource::authenticated();
        let mut tracker = AlertTracker::new();

        let ack = tracker
            .handle_callback(&source, "escalate:th-5:a-5")
            .await
            .unwrap();
        assert_eq!(ack.alert_id, "a-5");
        assert_eq!(source.escalated().await, vec!["a-5".to_string()]);
    }

    #[test]
    fn test_pending_notifications() {
        let mut tracker = AlertTracker::new();
        let payload = NotificationPayload {
            text: String::new(),
            thread_id: "th-1".into(),
            alert_id: "a-1".into(),
        };

        tracker.record_sent(MessageHandle(10), &payload);
        assert_eq!(tracker.pending_count(), 1);

        let pending = tracker.take_pending(MessageHandle(10)).unwrap();
        assert_eq!(pending.alert_id, "a-1");
        assert!(tracker.take_pending(MessageHandle(10)).is_none());
    }

    #[test]
    fn test_pending_dropped_when_alert_closes() {
        let mut tracker = AlertTracker::new();
        for (message, id) in [(1, "a-1"), (2, "a-2")] {
            let payload = NotificationPayload {
                text: String::new(),
                thread_id: format!("th-{id}"),
                alert_id: id.into(),
            };
            tracker.record_sent(MessageHandle(message), &payload);
        }
        assert_eq!(tracker.pending_count(), 2);

        // a-2 was closed upstream
        tracker.filter_new(vec![alert("a-1")]);
        assert_eq!(tracker.pending_count(), 1);
        assert!(tracker.is_pending(MessageHandle(1)));
        assert!(!tracker.is_pending(MessageHandle(2)));

        tracker.filter_new(Vec::new());
        assert_eq!(tracker.pending_count(), 0);
    }
}
