//! Per-session reporter.
//!
//! The reporter is driven by the host's session events:
//!
//! ```text
//! Idle --GameStart--> Active (warm-up check armed, then every `interval`)
//! Active --GameEnd--> Idle   (one final report, pending check cancelled)
//! ```
//!
//! Every cycle fetches the user summary, diffs it against the previous
//! snapshot and forwards the report. Nothing that goes wrong inside a cycle
//! reaches the host: failures are logged and the reporter re-arms anyway.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::client::RetroAchievementsClient;
use crate::error::{CoreError, Result};
use crate::events::{EventBus, SessionEvent};
use crate::host::{Host, PlaySession, SUPPORTED_IDENTIFIER};
use crate::snapshot::{build_report, recency_window, Snapshot};
use crate::storage::{PluginConfig, StateStore};
use crate::timer::CancellableTimer;

/// Delay before the first check of a session.
pub const WARM_UP_DELAY: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Idle,
    Active,
}

/// Whether a report describes a running or a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPhase {
    InProgress,
    Ended,
}

impl ReportPhase {
    /// Header placed before the report body in notifications.
    /// `{user_name}` is left for the notification service to fill in.
    pub fn framing(self, app: &str) -> String {
        match self {
            ReportPhase::InProgress => format!("{{user_name}} is playing **{app}**:\n\n"),
            ReportPhase::Ended => format!("{{user_name}} played **{app}**:\n\n"),
        }
    }
}

struct ReporterState {
    previous: Option<Snapshot>,
    lifecycle: Lifecycle,
}

pub struct SnapshotReporter {
    host: Arc<dyn Host>,
    session: Arc<dyn PlaySession>,
    client: RetroAchievementsClient,
    store: Option<StateStore>,
    config: Mutex<PluginConfig>,
    state: Mutex<ReporterState>,
    timer: CancellableTimer,
    /// Held for the whole of a cycle so fetches never overlap.
    cycle_lock: tokio::sync::Mutex<()>,
    warm_up: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SnapshotReporter {
    /// Create a reporter for `session`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedApp`] when the session's app was not
    /// identified by the RetroArch identifier.
    pub fn new(
        host: Arc<dyn Host>,
        session: Arc<dyn PlaySession>,
        client: RetroAchievementsClient,
        config: PluginConfig,
    ) -> Result<Self> {
        if !session.user_app().is_supported() {
            return Err(CoreError::UnsupportedApp(format!(
                "Current app not identified by {SUPPORTED_IDENTIFIER}."
            )));
        }

        Ok(Self {
            host,
            session,
            client,
            store: None,
            config: Mutex::new(config),
            state: Mutex::new(ReporterState {
                previous: None,
                lifecycle: Lifecycle::Idle,
            }),
            timer: CancellableTimer::new(),
            cycle_lock: tokio::sync::Mutex::new(()),
            warm_up: WARM_UP_DELAY,
        })
    }

    /// Persist fetched snapshots in `store`.
    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the delay before a session's first check.
    pub fn with_warm_up(mut self, warm_up: Duration) -> Self {
        self.warm_up = warm_up;
        self
    }

    pub fn session_id(&self) -> &str {
        self.session.id()
    }

    pub fn config(&self) -> PluginConfig {
        lock(&self.config).clone()
    }

    /// Takes effect from the next cycle.
    pub fn update_config(&self, config: PluginConfig) {
        *lock(&self.config) = config;
    }

    /// Polling interval in minutes.
    pub fn interval(&self) -> u32 {
        lock(&self.config).interval.max(1)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        lock(&self.state).lifecycle
    }

    pub fn previous_snapshot(&self) -> Option<Snapshot> {
        lock(&self.state).previous.clone()
    }

    pub fn has_pending_check(&self) -> bool {
        self.timer.is_armed()
    }

    /// Restore the diff baseline: the persisted snapshot for this session,
    /// or a fresh fetch when nothing was saved.
    pub async fn initialize(&self) {
        let restored = match &self.store {
            Some(store) => match store.load(self.session.id()) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(session = %self.session.id(), "Ignoring saved state: {e}");
                    None
                }
            },
            None => None,
        };

        let baseline = match restored {
            Some(snapshot) => {
                debug!(session = %self.session.id(), "Restored previous snapshot");
                Some(snapshot)
            }
            None => self.fetch_summary().await,
        };
        lock(&self.state).previous = baseline;

        debug!(session = %self.session.id(), "Reporter initialized");
    }

    /// Subscribe to this session's start and end events on `bus`.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) {
        let id = self.session.id();

        let weak = Arc::downgrade(self);
        bus.subscribe(SessionEvent::game_start_key(id), move |_| {
            let reporter = weak.upgrade();
            async move {
                if let Some(reporter) = reporter {
                    reporter.on_session_start();
                }
            }
        });

        let weak = Arc::downgrade(self);
        bus.subscribe(SessionEvent::game_end_key(id), move |_| {
            let reporter = weak.upgrade();
            async move {
                if let Some(reporter) = reporter {
                    reporter.on_session_end().await;
                }
            }
        });
    }

    /// Fetch the current summary. `None` covers offline users, missing
    /// credentials and any request failure.
    pub async fn fetch_summary(&self) -> Option<Snapshot> {
        let credentials = self.config().credentials();
        if !credentials.is_complete() {
            debug!(session = %self.session.id(), "RetroAchievements credentials not set");
            return None;
        }

        let snapshot = match self.client.get_user_summary(&credentials).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!(session = %self.session.id(), "User is offline");
                return None;
            }
            Err(e) => {
                warn!(session = %self.session.id(), "Failed to fetch summary: {e}");
                return None;
            }
        };

        if let Some(store) = &self.store {
            if let Err(e) = store.save(self.session.id(), &snapshot) {
                warn!(session = %self.session.id(), "Failed to persist snapshot: {e}");
            }
        }
        Some(snapshot)
    }

    /// Diff `snapshot` against the previous one and make it the new baseline.
    pub fn compute_report(&self, snapshot: Snapshot) -> Option<String> {
        self.compute_report_at(snapshot, Utc::now())
    }

    pub fn compute_report_at(&self, snapshot: Snapshot, now: DateTime<Utc>) -> Option<String> {
        let window = recency_window(self.interval());
        let mut state = lock(&self.state);
        let report = build_report(state.previous.as_ref(), &snapshot, window, now);
        if report.is_none() {
            debug!(session = %self.session.id(), "No change since last snapshot");
        }
        state.previous = Some(snapshot);
        report
    }

    /// Fetch and diff. `None` when there is nothing new to say.
    pub async fn get_report(&self) -> Option<String> {
        let snapshot = self.fetch_summary().await?;
        self.compute_report(snapshot)
    }

    /// Arm the warm-up check.
    pub fn on_session_start(self: &Arc<Self>) {
        debug!(session = %self.session.id(), "Session started");
        lock(&self.state).lifecycle = Lifecycle::Active;
        self.arm(self.warm_up);
    }

    /// Report once more, in past tense, stop polling and drop the session's
    /// saved snapshot.
    pub async fn on_session_end(self: &Arc<Self>) {
        debug!(session = %self.session.id(), "Session ended");
        lock(&self.state).lifecycle = Lifecycle::Idle;
        self.cancel();
        self.run_cycle(ReportPhase::Ended).await;
        // A cycle that was mid-flight when the session ended may have re-armed.
        self.cancel();

        if let Some(store) = &self.store {
            match store.remove(self.session.id()) {
                Ok(true) => debug!(session = %self.session.id(), "Removed saved state"),
                Ok(false) => {}
                Err(e) => warn!(session = %self.session.id(), "Failed to remove saved state: {e}"),
            }
        }
    }

    /// Cancel the pending check, if any.
    pub fn cancel(&self) {
        if self.timer.cancel() {
            debug!(session = %self.session.id(), "Cancelled pending check");
        }
    }

    /// One polling cycle: fetch, diff, deliver, then re-arm for
    /// in-progress cycles.
    pub async fn run_cycle(self: &Arc<Self>, phase: ReportPhase) {
        let _cycle = self.cycle_lock.lock().await;
        debug!(session = %self.session.id(), ?phase, "Running report cycle");

        // A separate task so a panic while building the report is contained too.
        let this = Arc::clone(self);
        match tokio::spawn(async move { this.report_update(phase).await }).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => debug!(session = %self.session.id(), "No difference since report"),
            Ok(Err(e)) => error!(session = %self.session.id(), "Failed to build update: {e}"),
            Err(e) => error!(session = %self.session.id(), "Report cycle aborted: {e}"),
        }

        if phase == ReportPhase::InProgress {
            self.reschedule();
        }
    }

    /// Deliver a report if there is one. Returns whether anything was sent.
    async fn report_update(&self, phase: ReportPhase) -> Result<bool> {
        let Some(details) = self.get_report().await else {
            return Ok(false);
        };
        let config = self.config();

        let mut status_failure = None;
        if config.add_status_updates {
            if let Err(e) = self.session.add_status_update(&details) {
                status_failure = Some(CoreError::Delivery {
                    target: "session".to_string(),
                    message: e.to_string(),
                });
            }
        }

        if config.notify {
            let text = phase.framing(&self.session.user_app().app) + &details;
            for service in self.host.notification_services() {
                if let Err(e) = service.notify(&text).await {
                    warn!(
                        session = %self.session.id(),
                        service = service.name(),
                        "Notification failed: {e}"
                    );
                }
            }
        }

        info!(session = %self.session.id(), ?phase, "Reported update");
        match status_failure {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }

    /// Re-arm after `interval` while this session is still the host's
    /// active one.
    fn reschedule(self: &Arc<Self>) {
        if self.lifecycle() != Lifecycle::Active {
            return;
        }
        let is_current = self.host.is_running()
            && self.host.active_session_id().as_deref() == Some(self.session.id());
        if !is_current {
            debug!(session = %self.session.id(), "Session no longer active; not rescheduling");
            return;
        }
        self.arm(Duration::from_secs(u64::from(self.interval()) * 60));
    }

    fn arm(self: &Arc<Self>, delay: Duration) {
        let this = Arc::clone(self);
        self.timer.arm(delay, async move {
            this.run_cycle(ReportPhase::InProgress).await;
        });
        debug!(session = %self.session.id(), ?delay, "Next check armed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::UserApp;
    use crate::integrations::NotificationService;
    use crate::snapshot::AchievementRecord;
    use chrono::Duration as ChronoDuration;

    struct StubSession {
        app: UserApp,
    }

    impl PlaySession for StubSession {
        fn id(&self) -> &str {
            "1"
        }

        fn user_app(&self) -> &UserApp {
            &self.app
        }

        fn add_status_update(
            &self,
            _text: &str,
        ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }
    }

    struct IdleHost;

    impl Host for IdleHost {
        fn is_running(&self) -> bool {
            true
        }

        fn active_session_id(&self) -> Option<String> {
            Some("1".to_string())
        }

        fn notification_services(&self) -> Vec<Arc<dyn NotificationService>> {
            Vec::new()
        }
    }

    fn reporter(identifier: &str) -> Result<SnapshotReporter> {
        SnapshotReporter::new(
            Arc::new(IdleHost),
            Arc::new(StubSession {
                app: UserApp::new("Sonic the Hedgehog", identifier),
            }),
            RetroAchievementsClient::with_base_url("http://127.0.0.1:9/API/").unwrap(),
            PluginConfig::default(),
        )
    }

    #[test]
    fn rejects_apps_from_other_identifiers() {
        let err = reporter("SteamIdentifierPlugin").err().unwrap();
        assert!(matches!(err, CoreError::UnsupportedApp(_)));
    }

    #[test]
    fn framing_switches_tense() {
        assert_eq!(
            ReportPhase::InProgress.framing("Sonic"),
            "{user_name} is playing **Sonic**:\n\n"
        );
        assert_eq!(
            ReportPhase::Ended.framing("Sonic"),
            "{user_name} played **Sonic**:\n\n"
        );
    }

    #[test]
    fn compute_report_always_replaces_baseline() {
        let reporter = reporter(SUPPORTED_IDENTIFIER).unwrap();
        let now = Utc::now();

        let first = Snapshot::new("Playing X");
        assert_eq!(
            reporter.compute_report_at(first.clone(), now).as_deref(),
            Some("Playing X")
        );
        assert_eq!(reporter.compute_report_at(first.clone(), now), None);
        assert_eq!(reporter.previous_snapshot(), Some(first));

        let second = Snapshot::new("Playing X (Level 2)").with_achievement(
            "42",
            AchievementRecord {
                title: "First Steps".to_string(),
                description: "Start the game".to_string(),
                points: 5,
                awarded_at: now - ChronoDuration::seconds(60),
            },
        );
        let report = reporter.compute_report_at(second.clone(), now).unwrap();
        assert!(report.ends_with(
            "1 new achievements:\n\n**First Steps**: Start the game (5 points)"
        ));
        assert_eq!(reporter.previous_snapshot(), Some(second));
    }

    #[test]
    fn recency_window_follows_configured_interval() {
        let reporter = reporter(SUPPORTED_IDENTIFIER).unwrap();
        let now = Utc::now();
        reporter.compute_report_at(Snapshot::new("p"), now);

        let mut config = reporter.config();
        config.interval = 10;
        reporter.update_config(config);

        // 1000s is outside a 5 minute window but inside a 10 minute one.
        let snap = Snapshot::new("p2").with_achievement(
            "1",
            AchievementRecord {
                title: "Late".to_string(),
                description: "d".to_string(),
                points: 1,
                awarded_at: now - ChronoDuration::seconds(1000),
            },
        );
        let report = reporter.compute_report_at(snap, now).unwrap();
        assert!(report.contains("**Late**"));
    }

    #[tokio::test]
    async fn missing_credentials_yield_no_summary() {
        let reporter = reporter(SUPPORTED_IDENTIFIER).unwrap();
        assert_eq!(reporter.fetch_summary().await, None);
        assert_eq!(reporter.get_report().await, None);
    }

    #[tokio::test]
    async fn cancel_without_pending_check_is_noop() {
        let reporter = Arc::new(reporter(SUPPORTED_IDENTIFIER).unwrap());
        reporter.cancel();
        reporter.cancel();
        assert!(!reporter.has_pending_check());
    }

    #[tokio::test(start_paused = true)]
    async fn session_start_arms_warm_up_check() {
        let reporter = Arc::new(reporter(SUPPORTED_IDENTIFIER).unwrap());
        reporter.on_session_start();
        assert_eq!(reporter.lifecycle(), Lifecycle::Active);
        assert!(reporter.has_pending_check());

        reporter.on_session_end().await;
        assert_eq!(reporter.lifecycle(), Lifecycle::Idle);
        assert!(!reporter.has_pending_check());
    }
}
