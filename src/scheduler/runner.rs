//! Tokio driver for the scheduler state machine.
//!
//! One task owns the [`ComplianceMonitor`] and a [`SchedulerCore`]. It waits
//! on three things at once: the command queue, the debounce deadline and the
//! in-flight snapshot fetch. The fetch runs as its own task so commands keep
//! flowing while a pass is in progress; its result is folded into the monitor
//! back on the driver task, so monitor state is only ever touched here.

use super::state::{Action, SchedulerCore, SchedulerState, SchedulerStats};
use crate::error::{ProfileError, ProviderError, SchedulerError};
use crate::ledger::TrendAnalysis;
use crate::models::{ElementSnapshot, PassReport, RunSummary};
use crate::monitor::ComplianceMonitor;
use crate::profiles::{
    MergeStrategy, NewProfile, Profile, ProfileExport, ProfileUpdate, RecommendationContext,
    Recommendations,
};
use crate::provider::{ChangeNotice, Scope};
use crate::report::ComplianceDocument;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::ControlFlow;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
const COMMAND_BUFFER: usize = 256;

type Reply<T> = oneshot::Sender<T>;
type ProfileReply<T> = Reply<Result<T, ProfileError>>;

enum Command {
    Notify(ChangeNotice),
    /// Explicit run; `None` asks for a full pass
    Run(Option<BTreeSet<String>>, Reply<PassReport>),
    LatestReport(Reply<Option<PassReport>>),
    History(usize, Reply<Vec<RunSummary>>),
    Trend(Reply<TrendAnalysis>),
    Recommendations(RecommendationContext, Reply<Recommendations>),
    Document(RecommendationContext, Reply<Option<ComplianceDocument>>),
    Profiles(Reply<Vec<Profile>>),
    CreateProfile(NewProfile, ProfileReply<Profile>),
    UpdateProfile(String, ProfileUpdate, ProfileReply<Profile>),
    DeleteProfile(String, ProfileReply<()>),
    ActivateProfile(String, ProfileReply<Profile>),
    DeactivateProfile(Reply<Option<String>>),
    RecordSatisfaction(String, f64, ProfileReply<f64>),
    ExportProfile(String, ProfileReply<ProfileExport>),
    ImportProfile(ProfileExport, bool, ProfileReply<Profile>),
    MergeProfiles(String, String, MergeStrategy, ProfileReply<Profile>),
    Status(Reply<SchedulerStatus>),
    Shutdown(Reply<()>),
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub stats: SchedulerStats,
    pub queued_elements: usize,
}

struct InFlight {
    scope: Scope,
    started: Instant,
    task: JoinHandle<Result<Vec<ElementSnapshot>, ProviderError>>,
    waiters: Vec<Reply<PassReport>>,
}

pub struct AnalysisScheduler;

impl AnalysisScheduler {
    /// Start the driver task. Must be called inside a tokio runtime.
    pub fn spawn(monitor: ComplianceMonitor, debounce: Duration) -> SchedulerHandle {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let driver = Driver {
            core: SchedulerCore::new(monitor.has_baseline()),
            monitor,
            debounce,
            deadline: None,
            in_flight: None,
            waiters: Vec::new(),
        };
        tokio::spawn(driver.run(rx));
        SchedulerHandle { tx }
    }
}

struct Driver {
    monitor: ComplianceMonitor,
    core: SchedulerCore,
    debounce: Duration,
    deadline: Option<Instant>,
    in_flight: Option<InFlight>,
    /// Explicit requests not yet covered by a started pass
    waiters: Vec<Reply<PassReport>>,
}

impl Driver {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        info!("Scheduler started (debounce {:?})", self.debounce);

        loop {
            let deadline = self.deadline;
            tokio::select! {
                command = rx.recv() => match command {
                    Some(command) => {
                        if let ControlFlow::Break(()) = self.handle(command).await {
                            break;
                        }
                    }
                    None => {
                        self.finish().await;
                        break;
                    }
                },
                _ = sleep_until_deadline(deadline) => {
                    self.deadline = None;
                    let actions = self.core.on_timer();
                    self.apply(actions);
                }
                result = join_in_flight(&mut self.in_flight) => {
                    if let Some(pass) = self.in_flight.take() {
                        let report = self.complete(pass, result).await;
                        let actions = self.core.on_pass_complete(!report.failed);
                        self.apply(actions);
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }

    async fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Notify(notice) => {
                debug!("Change notice: {:?}", notice);
                let actions = self.core.on_change(notice);
                self.apply(actions);
            }
            Command::Run(elements, reply) => {
                self.waiters.push(reply);
                let actions = self.core.on_request(elements);
                self.apply(actions);
            }
            Command::LatestReport(reply) => {
                let _ = reply.send(self.monitor.latest_report().cloned());
            }
            Command::History(limit, reply) => {
                let _ = reply.send(self.monitor.history(limit));
            }
            Command::Trend(reply) => {
                let _ = reply.send(self.monitor.trend(Utc::now()));
            }
            Command::Recommendations(context, reply) => {
                let _ = reply.send(self.monitor.recommendations(&context));
            }
            Command::Document(context, reply) => {
                let _ = reply.send(self.monitor.document(&context));
            }
            Command::Profiles(reply) => {
                let _ = reply.send(self.monitor.profiles().into_iter().cloned().collect());
            }
            Command::CreateProfile(new, reply) => {
                let _ = reply.send(self.monitor.create_profile(new).await);
            }
            Command::UpdateProfile(id, update, reply) => {
                let _ = reply.send(self.monitor.update_profile(&id, update).await);
            }
            Command::DeleteProfile(id, reply) => {
                let _ = reply.send(self.monitor.delete_profile(&id).await);
            }
            Command::ActivateProfile(id, reply) => {
                let _ = reply.send(self.monitor.activate_profile(&id).await);
            }
            Command::DeactivateProfile(reply) => {
                let _ = reply.send(self.monitor.deactivate_profile().await);
            }
            Command::RecordSatisfaction(id, sample, reply) => {
                let _ = reply.send(self.monitor.record_satisfaction(&id, sample).await);
            }
            Command::ExportProfile(id, reply) => {
                let _ = reply.send(self.monitor.export_profile(&id));
            }
            Command::ImportProfile(bundle, overwrite, reply) => {
                let _ = reply.send(self.monitor.import_profile(bundle, overwrite).await);
            }
            Command::MergeProfiles(source, target, strategy, reply) => {
                let _ = reply.send(
                    self.monitor
                        .merge_profiles(&source, &target, &strategy)
                        .await,
                );
            }
            Command::Status(reply) => {
                let _ = reply.send(SchedulerStatus {
                    state: self.core.state(),
                    stats: self.core.stats(),
                    queued_elements: self.core.queued().len(),
                });
            }
            Command::Shutdown(ack) => {
                self.finish().await;
                let _ = ack.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::ArmTimer => self.deadline = Some(Instant::now() + self.debounce),
                Action::CancelTimer => self.deadline = None,
                Action::StartPass(scope) => self.start(scope),
            }
        }
    }

    fn start(&mut self, scope: Scope) {
        if self.in_flight.is_some() {
            // The state machine never asks for this; refuse rather than overlap.
            warn!("Pass requested while another is in flight; ignoring");
            return;
        }

        match &scope {
            Scope::All => debug!("Starting full pass"),
            Scope::Elements(ids) => debug!("Starting incremental pass over {} elements", ids.len()),
        }

        let provider = self.monitor.provider();
        let request = scope.clone();
        let task = tokio::spawn(async move { provider.snapshot(request).await });
        self.in_flight = Some(InFlight {
            scope,
            started: Instant::now(),
            task,
            waiters: std::mem::take(&mut self.waiters),
        });
    }

    async fn complete(
        &mut self,
        pass: InFlight,
        result: Result<Vec<ElementSnapshot>, ProviderError>,
    ) -> PassReport {
        let report = self
            .monitor
            .apply_pass(&pass.scope, result, pass.started.elapsed());
        self.monitor.persist_history().await;
        for waiter in pass.waiters {
            let _ = waiter.send(report.clone());
        }
        report
    }

    /// Let the in-flight pass finish; passes are never abandoned midway.
    async fn finish(&mut self) {
        if self.in_flight.is_some() {
            let result = join_in_flight(&mut self.in_flight).await;
            if let Some(pass) = self.in_flight.take() {
                self.complete(pass, result).await;
            }
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn join_in_flight(
    in_flight: &mut Option<InFlight>,
) -> Result<Vec<ElementSnapshot>, ProviderError> {
    match in_flight {
        Some(pass) => match (&mut pass.task).await {
            Ok(result) => result,
            Err(e) => Err(ProviderError::Unavailable(format!(
                "snapshot task failed: {}",
                e
            ))),
        },
        None => std::future::pending().await,
    }
}

/// Cloneable handle to a running scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
}

impl SchedulerHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| SchedulerError::Stopped)?;
        rx.await.map_err(|_| SchedulerError::Stopped)
    }

    /// Report a change on the surface.
    pub async fn notify(&self, notice: ChangeNotice) -> Result<(), SchedulerError> {
        self.tx
            .send(Command::Notify(notice))
            .await
            .map_err(|_| SchedulerError::Stopped)
    }

    pub async fn notify_element(&self, id: impl Into<String>) -> Result<(), SchedulerError> {
        self.notify(ChangeNotice::Element(id.into())).await
    }

    /// Run a full pass now, or right after the in-flight one, and wait for it.
    pub async fn run_full_pass(&self) -> Result<PassReport, SchedulerError> {
        self.request(|reply| Command::Run(None, reply)).await
    }

    /// Run an incremental pass over `element_ids` and wait for it.
    pub async fn run_incremental_pass(
        &self,
        element_ids: impl IntoIterator<Item = String>,
    ) -> Result<PassReport, SchedulerError> {
        let ids: BTreeSet<String> = element_ids.into_iter().collect();
        self.request(|reply| Command::Run(Some(ids), reply)).await
    }

    pub async fn latest_report(&self) -> Result<Option<PassReport>, SchedulerError> {
        self.request(Command::LatestReport).await
    }

    pub async fn history(&self, limit: usize) -> Result<Vec<RunSummary>, SchedulerError> {
        self.request(|reply| Command::History(limit, reply)).await
    }

    pub async fn trend(&self) -> Result<TrendAnalysis, SchedulerError> {
        self.request(Command::Trend).await
    }

    pub async fn recommendations(
        &self,
        context: RecommendationContext,
    ) -> Result<Recommendations, SchedulerError> {
        self.request(|reply| Command::Recommendations(context, reply))
            .await
    }

    pub async fn document(
        &self,
        context: RecommendationContext,
    ) -> Result<Option<ComplianceDocument>, SchedulerError> {
        self.request(|reply| Command::Document(context, reply)).await
    }

    pub async fn profiles(&self) -> Result<Vec<Profile>, SchedulerError> {
        self.request(Command::Profiles).await
    }

    pub async fn create_profile(&self, new: NewProfile) -> Result<Profile, SchedulerError> {
        Ok(self
            .request(|reply| Command::CreateProfile(new, reply))
            .await??)
    }

    pub async fn update_profile(
        &self,
        id: impl Into<String>,
        update: ProfileUpdate,
    ) -> Result<Profile, SchedulerError> {
        let id = id.into();
        Ok(self
            .request(|reply| Command::UpdateProfile(id, update, reply))
            .await??)
    }

    pub async fn delete_profile(&self, id: impl Into<String>) -> Result<(), SchedulerError> {
        let id = id.into();
        Ok(self
            .request(|reply| Command::DeleteProfile(id, reply))
            .await??)
    }

    pub async fn activate_profile(&self, id: impl Into<String>) -> Result<Profile, SchedulerError> {
        let id = id.into();
        Ok(self
            .request(|reply| Command::ActivateProfile(id, reply))
            .await??)
    }

    pub async fn deactivate_profile(&self) -> Result<Option<String>, SchedulerError> {
        self.request(Command::DeactivateProfile).await
    }

    pub async fn record_satisfaction(
        &self,
        id: impl Into<String>,
        sample: f64,
    ) -> Result<f64, SchedulerError> {
        let id = id.into();
        Ok(self
            .request(|reply| Command::RecordSatisfaction(id, sample, reply))
            .await??)
    }

    pub async fn export_profile(
        &self,
        id: impl Into<String>,
    ) -> Result<ProfileExport, SchedulerError> {
        let id = id.into();
        Ok(self
            .request(|reply| Command::ExportProfile(id, reply))
            .await??)
    }

    pub async fn import_profile(
        &self,
        bundle: ProfileExport,
        overwrite: bool,
    ) -> Result<Profile, SchedulerError> {
        Ok(self
            .request(|reply| Command::ImportProfile(bundle, overwrite, reply))
            .await??)
    }

    pub async fn merge_profiles(
        &self,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        strategy: MergeStrategy,
    ) -> Result<Profile, SchedulerError> {
        let (source, target) = (source_id.into(), target_id.into());
        Ok(self
            .request(|reply| Command::MergeProfiles(source, target, strategy, reply))
            .await??)
    }

    pub async fn status(&self) -> Result<SchedulerStatus, SchedulerError> {
        self.request(Command::Status).await
    }

    /// Stop the scheduler after the in-flight pass, if any, completes.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.request(Command::Shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::models::PassKind;
    use crate::monitor::MonitorConfig;
    use crate::profiles::presets::VISUAL_IMPAIRMENT;
    use crate::provider::{SnapshotProvider, StaticProvider};
    use crate::storage::Persistence;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records every requested scope and how many fetches overlap.
    #[derive(Clone)]
    struct RecordingProvider {
        inner: StaticProvider,
        delay: Duration,
        scopes: Arc<Mutex<Vec<Scope>>>,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
    }

    impl RecordingProvider {
        fn new(delay: Duration) -> Self {
            Self {
                inner: StaticProvider::new(vec![
                    ElementSnapshot::new("a", Rgb::BLACK, Rgb::WHITE),
                    ElementSnapshot::new("b", Rgb::BLACK, Rgb::WHITE),
                ]),
                delay,
                scopes: Arc::new(Mutex::new(Vec::new())),
                active: Arc::new(AtomicUsize::new(0)),
                max_active: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn scopes(&self) -> Vec<Scope> {
            self.scopes.lock().unwrap().clone()
        }
    }

    impl SnapshotProvider for RecordingProvider {
        fn snapshot(&self, scope: Scope) -> BoxFuture<'_, Result<Vec<ElementSnapshot>, ProviderError>> {
            async move {
                self.scopes.lock().unwrap().push(scope.clone());
                let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_active.fetch_max(now_active, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                self.inner.snapshot(scope).await
            }
            .boxed()
        }
    }

    fn spawn(provider: &RecordingProvider) -> SchedulerHandle {
        let monitor = ComplianceMonitor::new(
            MonitorConfig::default(),
            Arc::new(provider.clone()),
            Persistence::in_memory(),
        );
        AnalysisScheduler::spawn(monitor, DEFAULT_DEBOUNCE)
    }

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_within_window_runs_one_pass() {
        let provider = RecordingProvider::new(Duration::ZERO);
        let handle = spawn(&provider);

        for n in 0..5 {
            handle.notify_element(format!("e{}", n)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        let status = handle.status().await.unwrap();
        assert_eq!(status.stats.passes_completed, 1);
        assert_eq!(status.stats.notifications, 5);
        assert_eq!(status.state, SchedulerState::Idle);
        assert_eq!(provider.scopes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_notifications_run_one_pass_each() {
        let provider = RecordingProvider::new(Duration::ZERO);
        let handle = spawn(&provider);

        for _ in 0..4 {
            handle.notify_element("a").await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        assert_eq!(handle.status().await.unwrap().stats.passes_completed, 4);
        let scopes = provider.scopes();
        assert_eq!(scopes[0], Scope::All);
        assert!(scopes[1..]
            .iter()
            .all(|s| *s == Scope::Elements(ids(&["a"]))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_during_pass_gets_a_later_pass() {
        let provider = RecordingProvider::new(Duration::from_millis(500));
        let handle = spawn(&provider);

        handle.notify_element("a").await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(handle.status().await.unwrap().state, SchedulerState::Running);

        handle.notify_element("b").await.unwrap();
        assert_eq!(
            handle.status().await.unwrap().state,
            SchedulerState::QueuedWhileRunning
        );
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(
            provider.scopes(),
            vec![Scope::All, Scope::Elements(ids(&["b"]))]
        );
        assert_eq!(provider.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(handle.history(10).await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_runs_skip_debounce_and_queue_behind_pass() {
        let provider = RecordingProvider::new(Duration::from_millis(500));
        let handle = spawn(&provider);

        let started = Instant::now();
        let report = handle.run_full_pass().await.unwrap();
        assert_eq!(report.metadata.kind, PassKind::Full);
        assert!(started.elapsed() >= Duration::from_millis(500));

        handle.notify_element("a").await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        let report = handle.run_incremental_pass(["b".to_string()]).await.unwrap();
        assert_eq!(report.metadata.kind, PassKind::Incremental);
        assert_eq!(
            provider.scopes()[2],
            Scope::Elements(ids(&["b"]))
        );
        assert_eq!(provider.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_profile_commands() {
        let provider = RecordingProvider::new(Duration::ZERO);
        let handle = spawn(&provider);

        let active = handle.activate_profile(VISUAL_IMPAIRMENT).await.unwrap();
        assert_eq!(active.usage.usage_count, 1);
        assert_eq!(
            handle.delete_profile(VISUAL_IMPAIRMENT).await.unwrap_err(),
            SchedulerError::Profile(ProfileError::Immutable(VISUAL_IMPAIRMENT.to_string()))
        );

        let recs = handle
            .recommendations(RecommendationContext {
                prefers_high_contrast: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(recs.surfaced[0].profile_id, VISUAL_IMPAIRMENT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_handle() {
        let provider = RecordingProvider::new(Duration::ZERO);
        let handle = spawn(&provider);

        handle.shutdown().await.unwrap();
        assert_eq!(
            handle.notify_element("a").await.unwrap_err(),
            SchedulerError::Stopped
        );
    }
}
