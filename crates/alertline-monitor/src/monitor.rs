//! The polling loop.
//!
//! [`AlertMonitor`] owns the [`AlertTracker`] and drives two cadences from a
//! single cooperative loop: chat actions are polled on a short fixed interval
//! and the alert backend on a jittered one. Every pass runs to completion
//! before the next tick, so the tracker is never touched concurrently.
//!
//! Transient collaborator failures are logged and mean "no data this cycle".
//! That includes a backend session lost mid-run, which is renewed with a
//! fresh login. Only a failed login at startup, or an error that is not
//! transient, ends the loop, after a best-effort error message to the chat.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use alertline_core::{
    AlertlineError, CallHandle, DEFAULT_VOICE_MESSAGE, Result, ScheduleConfig, escape_markup,
};
use alertline_notify::{ActionUpdate, NotificationChannel, VoiceNotifier};
use alertline_source::AlertSource;

use crate::formatter;
use crate::schedule::Cadence;
use crate::tracker::{Acknowledged, AlertTracker, Rejection};

/// Cooperative stop flag shared with signal handlers and tests.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    inner: Arc<StopInner>,
}

#[derive(Debug, Default)]
struct StopInner {
    stopped: AtomicBool,
    wake: Notify,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the loop to end after the current tick.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.wake.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    async fn stopped(&self) {
        if !self.is_stopped() {
            self.inner.wake.notified().await;
        }
    }
}

/// Outcome of one action-poll pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionReport {
    pub polled: usize,
    pub acknowledged: usize,
    pub duplicates: usize,
    pub malformed: usize,
    pub failed: usize,
    /// The poll itself failed transiently
    pub poll_failed: bool,
    /// A lost backend session was renewed during this pass
    pub session_renewed: bool,
}

/// Outcome of one alert-poll pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertReport {
    pub fetched: usize,
    pub new: usize,
    pub sent: usize,
    pub unsent: usize,
    /// Voice call placed for this batch, if any
    pub call: Option<CallHandle>,
    /// The fetch itself failed transiently
    pub fetch_failed: bool,
    /// A lost backend session was renewed during this pass
    pub session_renewed: bool,
}

/// What a single tick did. `None` means the cadence was not due.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub actions: Option<ActionReport>,
    pub alerts: Option<AlertReport>,
}

/// Orchestrates the source, the chat channel and the voice notifier.
pub struct AlertMonitor {
    source: Arc<dyn AlertSource>,
    channel: Arc<dyn NotificationChannel>,
    voice: Arc<dyn VoiceNotifier>,
    tracker: AlertTracker,
    schedule: ScheduleConfig,
    voice_message: String,
    action_cadence: Cadence,
    alert_cadence: Cadence,
    stop: StopHandle,
}

impl AlertMonitor {
    pub fn new(
        source: Arc<dyn AlertSource>,
        channel: Arc<dyn NotificationChannel>,
        voice: Arc<dyn VoiceNotifier>,
        schedule: ScheduleConfig,
    ) -> Self {
        let now = Instant::now();
        Self {
            source,
            channel,
            voice,
            tracker: AlertTracker::new(),
            action_cadence: Cadence::for_actions(&schedule, now),
            alert_cadence: Cadence::for_alerts(&schedule, now),
            schedule,
            voice_message: DEFAULT_VOICE_MESSAGE.to_string(),
            stop: StopHandle::new(),
        }
    }

    /// Text spoken on the escalation call.
    pub fn with_voice_message(mut self, message: impl Into<String>) -> Self {
        self.voice_message = message.into();
        self
    }

    pub fn tracker(&self) -> &AlertTracker {
        &self.tracker
    }

    pub fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    /// Handle that ends `run` when stopped.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Log in to the alert backend. Must succeed before the loop starts.
    pub async fn initialize(&self) -> Result<()> {
        info!(source = self.source.name(), "Authenticating with alert source");
        match self.source.authenticate().await {
            Ok(()) => {
                info!(source = self.source.name(), "Authentication succeeded");
                Ok(())
            }
            Err(e) => {
                error!(source = self.source.name(), error = %e, "Authentication failed");
                Err(e)
            }
        }
    }

    /// Log in again after the backend dropped the session mid-run.
    ///
    /// A failure is logged only; the next poll tries again.
    async fn renew_session(&self) -> bool {
        warn!(source = self.source.name(), "Backend session lost, logging in again");
        match self.source.authenticate().await {
            Ok(()) => {
                info!(source = self.source.name(), "Session renewed");
                true
            }
            Err(e) => {
                warn!(source = self.source.name(), error = %e, "Session renewal failed");
                false
            }
        }
    }

    /// Run whichever cadences are due at `now`.
    pub async fn tick(&mut self, now: Instant) -> Result<TickReport> {
        let mut report = TickReport::default();

        if self.action_cadence.is_due(now) {
            report.actions = Some(self.process_actions().await?);
            self.action_cadence.complete(now);
        }

        if self.alert_cadence.is_due(now) {
            report.alerts = Some(self.check_alerts().await?);
            self.alert_cadence.complete(now);
            debug!(
                next_in_secs = self.alert_cadence.interval().as_secs(),
                "alert poll rescheduled"
            );
        }

        Ok(report)
    }

    /// Poll the channel for button presses and apply each one.
    pub async fn process_actions(&mut self) -> Result<ActionReport> {
        let mut report = ActionReport::default();

        let updates = match self.channel.poll_actions().await {
            Ok(updates) => updates,
            Err(e) if e.is_transient() => {
                warn!(channel = self.channel.name(), error = %e, "Failed to poll actions");
                report.poll_failed = true;
                return Ok(report);
            }
            Err(e) => return Err(e),
        };
        report.polled = updates.len();

        let mut renewal_attempted = false;
        for update in updates {
            let outcome = self
                .tracker
                .handle_callback(self.source.as_ref(), &update.callback_data)
                .await;

            match outcome {
                Ok(ack) => {
                    info!(
                        alert_id = %ack.alert_id,
                        thread_id = %ack.thread_id,
                        disposition = %ack.disposition,
                        user_id = ?update.user_id,
                        "Action applied"
                    );
                    report.acknowledged += 1;
                    self.acknowledge(&update, &ack).await?;
                }
                Err(Rejection::Malformed(e)) => {
                    warn!(update_id = update.update_id, error = %e, "Dropping malformed callback");
                    report.malformed += 1;
                }
                Err(Rejection::AlreadyHandled { .. }) => {
                    report.duplicates += 1;
                }
                Err(Rejection::RemoteFailure { source, .. }) if source.is_fatal() => {
                    return Err(source);
                }
                Err(Rejection::RemoteFailure {
                    alert_id,
                    action,
                    source,
                }) => {
                    warn!(
                        update_id = update.update_id,
                        %alert_id,
                        %action,
                        error = %source,
                        "Action not applied"
                    );
                    report.failed += 1;
                    if source.is_auth_error() && !renewal_attempted {
                        renewal_attempted = true;
                        report.session_renewed = self.renew_session().await;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Replace the pressed message with a confirmation and drop its buttons.
    async fn acknowledge(&mut self, update: &ActionUpdate, ack: &Acknowledged) -> Result<()> {
        let Some(message) = update.message else {
            warn!(update_id = update.update_id, "Callback carries no message; nothing to edit");
            return Ok(());
        };

        match self.tracker.take_pending(message) {
            Some(pending) if pending.alert_id != ack.alert_id => {
                warn!(
                    message_id = message.0,
                    sent_for = %pending.alert_id,
                    pressed_for = %ack.alert_id,
                    "Button payload does not match the alert this message was sent for"
                );
            }
            Some(_) => {}
            None => {
                debug!(message_id = message.0, "acknowledged message is not pending");
            }
        }

        let text = formatter::acknowledgement(ack.disposition, Utc::now(), &update.message_text);
        match self.channel.edit(message, &text, true).await {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                warn!(message_id = message.0, error = %e, "Failed to edit acknowledged message");
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Fetch open alerts, notify about new ones and place one voice call.
    pub async fn check_alerts(&mut self) -> Result<AlertReport> {
        let mut report = AlertReport::default();

        let open = match self.source.fetch_open_alerts().await {
            Ok(open) => open,
            Err(e) if e.is_transient() => {
                warn!(source = self.source.name(), error = %e, "Failed to fetch alerts");
                report.fetch_failed = true;
                if e.is_auth_error() {
                    report.session_renewed = self.renew_session().await;
                }
                return Ok(report);
            }
            Err(e) => return Err(e),
        };
        report.fetched = open.len();

        let fresh = self.tracker.filter_new(open);
        report.new = fresh.len();
        if fresh.is_empty() {
            debug!(open = report.fetched, "no new alerts");
            return Ok(report);
        }
        info!(count = fresh.len(), "New alerts found");

        for alert in &fresh {
            let description = match self.source.fetch_description(&alert.thread_id).await {
                Ok(description) => description,
                Err(e) if e.is_transient() => {
                    warn!(thread_id = %alert.thread_id, error = %e, "Failed to fetch description");
                    None
                }
                Err(e) => return Err(e),
            };

            let payload = formatter::render(alert, description.as_deref());
            match self.channel.send(&payload).await {
                Ok(message) => {
                    self.tracker.record_sent(message, &payload);
                    report.sent += 1;
                }
                Err(e) => {
                    self.tracker.release(&alert.id);
                    if e.is_fatal() {
                        return Err(e);
                    }
                    warn!(alert_id = %alert.id, error = %e, "Failed to send alert; will retry next poll");
                    report.unsent += 1;
                }
            }
        }

        match self.voice.trigger_voice_alert(&self.voice_message).await {
            Ok(call) => {
                info!(voice = self.voice.name(), call_id = %call, "Voice alert triggered");
                report.call = Some(call);
            }
            Err(e) if e.is_transient() => {
                warn!(voice = self.voice.name(), error = %e, "Failed to trigger voice alert");
            }
            Err(e) => return Err(e),
        }

        Ok(report)
    }

    /// Authenticate, then tick until stopped or a fatal error occurs.
    ///
    /// Ctrl-C sets the stop flag; the flag is honored between ticks.
    pub async fn run(&mut self) -> Result<()> {
        self.initialize().await?;

        let stop = self.stop.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping after current tick");
                stop.stop();
            }
        });

        let tick = Duration::from_secs(self.schedule.tick_secs);
        info!(
            tick_secs = self.schedule.tick_secs,
            action_poll_secs = self.schedule.action_poll_secs,
            "Alert monitor started"
        );

        let outcome = loop {
            if self.stop.is_stopped() {
                break Ok(());
            }
            if let Err(e) = self.tick(Instant::now()).await {
                error!(error = %e, "Fatal error in monitor loop");
                break Err(e);
            }
            tokio::select! {
                _ = tokio::time::sleep(tick) => {}
                _ = self.stop.stopped() => {}
            }
        };

        interrupt.abort();
        self.shutdown(outcome.as_ref().err()).await;
        outcome
    }

    /// Mark the monitor stopped and report a fatal error to the chat.
    pub async fn shutdown(&self, error: Option<&AlertlineError>) {
        self.stop.stop();

        if let Some(e) = error {
            let text = format!(
                "Alert monitor stopped: {}",
                escape_markup(&e.to_string())
            );
            if let Err(send_err) = self.channel.send_error(&text).await {
                warn!(error = %send_err, "Could not report shutdown error to chat");
            }
        }

        info!(
            seen = self.tracker.seen_count(),
            handled = self.tracker.handled_count(),
            "Alert monitor stopped"
        );
    }
}
