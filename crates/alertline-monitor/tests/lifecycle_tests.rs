//! End-to-end lifecycle tests for the alert monitor.
//!
//! These tests cover:
//! - Alert polling, deduplication and delivery
//! - Button presses relayed to the alert backend
//! - Failure handling for fetches, sends and remote actions
//! - Loop start-up, interrupt and recovery from a lost backend session

use std::sync::Arc;
use std::time::{Duration, Instant};

use alertline_core::logging;
use alertline_core::{
    ActionKind, AlertRecord, AlertlineError, CallbackData, MessageHandle, ScheduleConfig, Severity,
};
use alertline_monitor::AlertMonitor;
use alertline_notify::{ActionUpdate, MockChannel, MockVoice};
use alertline_source::MockAlertSource;

struct Fixture {
    source: Arc<MockAlertSource>,
    channel: Arc<MockChannel>,
    voice: Arc<MockVoice>,
}

impl Fixture {
    fn new(source: MockAlertSource) -> Self {
        logging::init_test_logging();
        Self {
            source: Arc::new(source),
            channel: Arc::new(MockChannel::new()),
            voice: Arc::new(MockVoice::new()),
        }
    }

    fn monitor(&self, schedule: ScheduleConfig) -> AlertMonitor {
        AlertMonitor::new(
            self.source.clone(),
            self.channel.clone(),
            self.voice.clone(),
            schedule,
        )
    }
}

fn immediate_schedule() -> ScheduleConfig {
    ScheduleConfig {
        initial_alert_delay_secs: 0,
        ..Default::default()
    }
}

fn fast_schedule() -> ScheduleConfig {
    ScheduleConfig {
        tick_secs: 1,
        action_poll_secs: 1,
        alert_poll_min_secs: 1,
        alert_poll_max_secs: 1,
        initial_alert_delay_secs: 0,
    }
}

fn critical(id: &str) -> AlertRecord {
    AlertRecord::new(id, format!("thread-{id}"), Severity::Critical)
        .with_origin("acme", "prod")
        .with_subject("feed handler down")
}

// ============================================================
// Alert Polling Tests
// ============================================================

#[tokio::test]
async fn test_new_alert_is_rendered_and_sent() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(immediate_schedule());
    fx.source.set_open_alerts(vec![critical("1")]).await;
    fx.source
        .set_description("thread-1", "no ticks <since> 09:00")
        .await;

    let report = monitor.check_alerts().await.unwrap();
    assert_eq!(report.sent, 1);

    let sent = fx.channel.sent().await;
    assert_eq!(sent.len(), 1);
    let (handle, payload) = &sent[0];
    assert_eq!(
        payload.text,
        "<b>Critical</b> 🔴 acme:prod - feed handler down\nno ticks &lt;since&gt; 09:00\n"
    );
    assert_eq!(payload.alert_id, "1");
    assert_eq!(payload.thread_id, "thread-1");
    assert_eq!(payload.buttons()[0].1, "escalate:thread-1:1");
    assert!(monitor.tracker().is_pending(*handle));
}

#[tokio::test]
async fn test_reset_on_empty_through_the_loop() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(immediate_schedule());

    fx.source.set_open_alerts(vec![critical("1")]).await;
    assert_eq!(monitor.check_alerts().await.unwrap().new, 1);
    assert_eq!(monitor.check_alerts().await.unwrap().new, 0);

    fx.source.set_open_alerts(vec![]).await;
    assert_eq!(monitor.check_alerts().await.unwrap().new, 0);

    fx.source.set_open_alerts(vec![critical("1")]).await;
    assert_eq!(monitor.check_alerts().await.unwrap().new, 1);

    assert_eq!(fx.channel.sent().await.len(), 2);
    assert_eq!(monitor.tracker().pending_count(), 1);
    assert_eq!(fx.voice.calls().await.len(), 2);
}

#[tokio::test]
async fn test_fetch_failure_keeps_seen_set() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(immediate_schedule());
    fx.source.set_open_alerts(vec![critical("1")]).await;
    monitor.check_alerts().await.unwrap();

    fx.source.fail_next_fetch();
    let report = monitor.check_alerts().await.unwrap();
    assert!(report.fetch_failed);
    assert!(monitor.tracker().is_seen("1"));

    assert_eq!(monitor.check_alerts().await.unwrap().new, 0);
    assert_eq!(fx.channel.sent().await.len(), 1);
}

#[tokio::test]
async fn test_forbidden_fetch_is_survivable() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(immediate_schedule());
    fx.source.set_open_alerts(vec![critical("1")]).await;

    fx.source.set_fetch_status(403);
    let report = monitor.check_alerts().await.unwrap();
    assert!(report.fetch_failed);
    assert!(report.session_renewed);
    assert_eq!(fx.source.login_calls(), 1);
    assert!(fx.channel.sent().await.is_empty());

    fx.source.set_fetch_status(0);
    let report = monitor.check_alerts().await.unwrap();
    assert_eq!(report.sent, 1);
}

#[tokio::test]
async fn test_server_error_on_fetch_does_not_log_in_again() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(immediate_schedule());

    fx.source.set_fetch_status(502);
    let report = monitor.check_alerts().await.unwrap();
    assert!(report.fetch_failed);
    assert!(!report.session_renewed);
    assert_eq!(fx.source.login_calls(), 0);
}

#[tokio::test]
async fn test_expired_session_recovers_on_next_fetch() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(immediate_schedule());
    fx.source.set_open_alerts(vec![critical("1")]).await;

    fx.source.expire_session();
    let report = monitor.check_alerts().await.unwrap();
    assert!(report.fetch_failed);
    assert!(report.session_renewed);

    let report = monitor.check_alerts().await.unwrap();
    assert_eq!(report.new, 1);
    assert_eq!(report.sent, 1);
}

#[tokio::test]
async fn test_failed_send_is_retried_next_poll() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(immediate_schedule());
    fx.source.set_open_alerts(vec![critical("1")]).await;

    fx.channel.set_sends_failing(true);
    let report = monitor.check_alerts().await.unwrap();
    assert_eq!(report.unsent, 1);
    assert!(!monitor.tracker().is_seen("1"));

    fx.channel.set_sends_failing(false);
    let report = monitor.check_alerts().await.unwrap();
    assert_eq!(report.new, 1);
    assert_eq!(report.sent, 1);
}

#[tokio::test]
async fn test_tick_honors_cadences() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(ScheduleConfig::default());
    let start = Instant::now();

    // Initial alert delay is one second
    let report = monitor.tick(start).await.unwrap();
    assert!(report.actions.is_some());
    assert!(report.alerts.is_none());

    let report = monitor.tick(start + Duration::from_secs(1)).await.unwrap();
    assert!(report.actions.is_none());
    assert!(report.alerts.is_some());

    let report = monitor.tick(start + Duration::from_secs(3)).await.unwrap();
    assert!(report.actions.is_some());
    assert!(report.alerts.is_none());

    let report = monitor.tick(start + Duration::from_secs(77)).await.unwrap();
    assert!(report.alerts.is_some());
    assert_eq!(fx.source.fetch_calls(), 2);
}

// ============================================================
// Action Handling Tests
// ============================================================

#[tokio::test]
async fn test_dismiss_pressed_twice() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(immediate_schedule());

    fx.channel
        .press("dismiss:threadA:alert1", Some(MessageHandle(100)))
        .await;
    fx.channel
        .press("dismiss:threadA:alert1", Some(MessageHandle(100)))
        .await;

    let report = monitor.process_actions().await.unwrap();
    assert_eq!(report.acknowledged, 1);
    assert_eq!(report.duplicates, 1);

    assert_eq!(fx.source.action_calls(), 1);
    assert_eq!(fx.source.dismissed().await, vec!["threadA".to_string()]);
    assert_eq!(fx.channel.edits().await.len(), 1);
}

#[tokio::test]
async fn test_escalation_edits_original_message() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(immediate_schedule());
    fx.source.set_open_alerts(vec![critical("7")]).await;
    monitor.check_alerts().await.unwrap();

    let (handle, payload) = fx.channel.sent().await.remove(0);
    fx.channel
        .push_update(ActionUpdate {
            update_id: 50,
            callback_data: payload.callback(ActionKind::Escalate).encode(),
            message: Some(handle),
            message_text: "Critical acme:prod - feed handler down".to_string(),
            user_id: Some(42),
        })
        .await;

    let report = monitor.process_actions().await.unwrap();
    assert_eq!(report.acknowledged, 1);
    assert_eq!(fx.source.escalated().await, vec!["7".to_string()]);
    assert!(fx.source.dismissed().await.is_empty());

    let edits = fx.channel.edits().await;
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].message, handle);
    assert!(edits[0].remove_buttons);
    assert!(edits[0].text.starts_with("The alert has been escalated. [Updated at "));
    assert!(edits[0].text.ends_with("] - Alert: Critical acme:prod - feed handler down"));
    assert_eq!(monitor.tracker().pending_count(), 0);
}

#[tokio::test]
async fn test_escalate_after_dismiss_is_rejected() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(immediate_schedule());

    let dismiss = CallbackData::new(ActionKind::Dismiss, "thread-1", "1");
    let escalate = CallbackData::new(ActionKind::Escalate, "thread-1", "1");
    fx.channel.press(dismiss.encode(), Some(MessageHandle(1))).await;
    fx.channel.press(escalate.encode(), Some(MessageHandle(1))).await;

    let report = monitor.process_actions().await.unwrap();
    assert_eq!(report.acknowledged, 1);
    assert_eq!(report.duplicates, 1);
    assert!(fx.source.escalated().await.is_empty());
}

#[tokio::test]
async fn test_failed_remote_action_can_be_retried() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(immediate_schedule());

    fx.source.set_actions_failing(true);
    fx.channel.press("escalate:t:a", Some(MessageHandle(5))).await;
    let report = monitor.process_actions().await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(fx.channel.edits().await.is_empty());

    fx.source.set_actions_failing(false);
    fx.channel.press("escalate:t:a", Some(MessageHandle(5))).await;
    let report = monitor.process_actions().await.unwrap();
    assert_eq!(report.acknowledged, 1);
    assert_eq!(fx.channel.edits().await.len(), 1);
}

#[tokio::test]
async fn test_forbidden_action_is_survivable() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(immediate_schedule());

    fx.source.set_actions_status(403);
    fx.channel.press("dismiss:t:a", Some(MessageHandle(5))).await;
    let report = monitor.process_actions().await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(report.session_renewed);
    assert_eq!(monitor.tracker().disposition("a"), None);
    assert!(fx.channel.edits().await.is_empty());

    fx.source.set_actions_status(0);
    fx.channel.press("dismiss:t:a", Some(MessageHandle(5))).await;
    let report = monitor.process_actions().await.unwrap();
    assert_eq!(report.acknowledged, 1);
    assert_eq!(fx.source.dismissed().await, vec!["t".to_string()]);
}

#[tokio::test]
async fn test_expired_session_during_actions_logs_in_once() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(immediate_schedule());

    fx.source.expire_session();
    fx.channel.press("escalate:t1:a1", Some(MessageHandle(1))).await;
    fx.channel.press("escalate:t2:a2", Some(MessageHandle(2))).await;

    // The first press fails and renews the session; the second then succeeds
    let report = monitor.process_actions().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.acknowledged, 1);
    assert!(report.session_renewed);
    assert_eq!(fx.source.login_calls(), 1);
    assert_eq!(fx.source.escalated().await, vec!["a2".to_string()]);

    fx.channel.press("escalate:t1:a1", Some(MessageHandle(1))).await;
    let report = monitor.process_actions().await.unwrap();
    assert_eq!(report.acknowledged, 1);
    assert_eq!(fx.source.escalated().await.len(), 2);
}

#[tokio::test]
async fn test_press_on_message_sent_for_other_alert_still_applies() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(immediate_schedule());
    fx.source.set_open_alerts(vec![critical("1")]).await;
    monitor.check_alerts().await.unwrap();
    let (handle, _) = fx.channel.sent().await.remove(0);

    // The button payload is authoritative even when it names another alert
    fx.channel.press("dismiss:thread-2:2", Some(handle)).await;
    let report = monitor.process_actions().await.unwrap();
    assert_eq!(report.acknowledged, 1);
    assert_eq!(fx.source.dismissed().await, vec!["thread-2".to_string()]);
    assert!(!monitor.tracker().is_pending(handle));
}

#[tokio::test]
async fn test_malformed_callbacks_are_dropped() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(immediate_schedule());

    fx.channel.press("snooze:t:a", None).await;
    fx.channel.press("dismiss:t", None).await;

    let report = monitor.process_actions().await.unwrap();
    assert_eq!(report.polled, 2);
    assert_eq!(report.malformed, 2);
    assert_eq!(fx.source.action_calls(), 0);
}

#[tokio::test]
async fn test_poll_failure_is_not_fatal() {
    let fx = Fixture::new(MockAlertSource::authenticated());
    let mut monitor = fx.monitor(immediate_schedule());

    fx.channel.fail_next_poll();
    let report = monitor.process_actions().await.unwrap();
    assert!(report.poll_failed);
}

// ============================================================
// Loop Lifecycle Tests
// ============================================================

#[tokio::test]
async fn test_rejected_login_aborts_before_polling() {
    let fx = Fixture::new(MockAlertSource::new().with_rejected_login());
    let mut monitor = fx.monitor(immediate_schedule());

    let err = monitor.run().await.unwrap_err();
    assert!(matches!(err, AlertlineError::Authentication { .. }));
    assert_eq!(fx.source.fetch_calls(), 0);
    assert!(fx.channel.sent().await.is_empty());
}

#[tokio::test]
async fn test_stop_ends_run_cleanly() {
    let fx = Fixture::new(MockAlertSource::new());
    let mut monitor = fx.monitor(immediate_schedule());
    fx.source.set_open_alerts(vec![critical("1")]).await;

    let stop = monitor.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.stop();
    });

    tokio::time::timeout(Duration::from_secs(5), monitor.run())
        .await
        .expect("run did not stop")
        .unwrap();

    assert_eq!(fx.source.fetch_calls(), 1);
    assert_eq!(fx.channel.sent().await.len(), 1);
    assert!(fx.channel.errors().await.is_empty());
}

#[tokio::test]
async fn test_loop_survives_expired_session() {
    let fx = Fixture::new(MockAlertSource::new());
    let mut monitor = fx.monitor(fast_schedule());
    fx.source.set_open_alerts(vec![critical("1")]).await;

    let source = fx.source.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        source.expire_session();
    });
    let stop = monitor.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1600)).await;
        stop.stop();
    });

    tokio::time::timeout(Duration::from_secs(10), monitor.run())
        .await
        .expect("run did not stop")
        .unwrap();

    // Startup login plus one renewal after the session expired
    assert_eq!(fx.source.login_calls(), 2);
    assert_eq!(fx.channel.sent().await.len(), 1);
    assert!(fx.channel.errors().await.is_empty());
}
