//! The compliance monitoring core.
//!
//! [`ComplianceMonitor`] is constructed explicitly and owns every stateful
//! component: the per-element outcomes behind the current issue set, the
//! ledger, the profile manager and the persistence layer. It does not
//! schedule anything itself; the scheduler decides when a pass runs and
//! hands the fetched snapshots to [`ComplianceMonitor::apply_pass`].

use crate::analysis::{
    category_scores, generate_advice, overall_score, sort_issues_by_severity, ClassifierConfig,
    ElementEvaluator, ElementOutcome, IssueClassifier,
};
use crate::error::{ProfileError, ProviderError};
use crate::ledger::{ComplianceLedger, TrendAnalysis, TrendChange, TrendConfig, TrendEngine};
use crate::models::{
    score_grade, ElementSnapshot, Issue, IssueSummary, PassKind, PassReport, ReportMetadata,
    RunSummary, SkippedElement,
};
use crate::profiles::{
    MergeStrategy, NewProfile, Profile, ProfileExport, ProfileManager, ProfileManagerConfig,
    ProfileUpdate, RecommendationConfig, RecommendationContext, RecommendationEngine,
    Recommendations, StoredProfiles,
};
use crate::provider::{NoRules, RuleCatalog, Scope, SnapshotProvider};
use crate::report::{
    ComplianceDocument, MonitorEvent, PassEvent, RecommendationEvent, ReportSink, TracingSink,
};
use crate::storage::{Persistence, ACTIVE_PROFILE_KEY, HISTORY_KEY, PROFILES_KEY};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Tunables of the monitoring core, one field per component.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub classifier: ClassifierConfig,
    pub simulate_color_blindness: bool,
    pub history_cap: usize,
    pub trend: TrendConfig,
    pub profiles: ProfileManagerConfig,
    pub recommendations: RecommendationConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            simulate_color_blindness: true,
            history_cap: crate::ledger::DEFAULT_HISTORY_CAP,
            trend: TrendConfig::default(),
            profiles: ProfileManagerConfig::default(),
            recommendations: RecommendationConfig::default(),
        }
    }
}

pub struct ComplianceMonitor {
    classifier: IssueClassifier,
    simulate_color_blindness: bool,
    provider: Arc<dyn SnapshotProvider>,
    rules: Arc<dyn RuleCatalog>,
    sink: Arc<dyn ReportSink>,
    /// Latest outcome per known element; the current issue set derives from it
    outcomes: BTreeMap<String, ElementOutcome>,
    has_baseline: bool,
    ledger: ComplianceLedger,
    trend: TrendEngine,
    profiles: ProfileManager,
    recommender: RecommendationEngine,
    persistence: Persistence,
}

impl ComplianceMonitor {
    pub fn new(
        config: MonitorConfig,
        provider: Arc<dyn SnapshotProvider>,
        persistence: Persistence,
    ) -> Self {
        Self {
            classifier: IssueClassifier::new(config.classifier),
            simulate_color_blindness: config.simulate_color_blindness,
            provider,
            rules: Arc::new(NoRules),
            sink: Arc::new(TracingSink),
            outcomes: BTreeMap::new(),
            has_baseline: false,
            ledger: ComplianceLedger::new(config.history_cap),
            trend: TrendEngine::new(config.trend),
            profiles: ProfileManager::new(config.profiles),
            recommender: RecommendationEngine::new(config.recommendations),
            persistence,
        }
    }

    pub fn with_rules(mut self, rules: Arc<dyn RuleCatalog>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Restore history and profiles from storage. Missing or corrupt data
    /// leaves the corresponding state empty.
    pub async fn load(&mut self) {
        let history: Vec<RunSummary> = self
            .persistence
            .load(HISTORY_KEY)
            .await
            .unwrap_or_default();
        let cap = self.ledger.cap();
        self.ledger = ComplianceLedger::with_history(cap, history);

        let stored: StoredProfiles = self
            .persistence
            .load(PROFILES_KEY)
            .await
            .unwrap_or_default();
        let active: Option<Option<String>> = self.persistence.load(ACTIVE_PROFILE_KEY).await;
        self.profiles.restore(stored, active.flatten(), Utc::now());

        info!(
            "Loaded {} history entries and {} user profiles",
            self.ledger.len(),
            self.profiles.user_profile_count()
        );
    }

    pub fn provider(&self) -> Arc<dyn SnapshotProvider> {
        Arc::clone(&self.provider)
    }

    /// Whether a full pass has established the known element set.
    pub fn has_baseline(&self) -> bool {
        self.has_baseline
    }

    pub fn known_elements(&self) -> usize {
        self.outcomes.len()
    }

    /// The current issue set, most severe first.
    pub fn current_issues(&self) -> Vec<Issue> {
        let mut issues: Vec<Issue> = self
            .outcomes
            .values()
            .flat_map(|o| o.issues.iter().cloned())
            .collect();
        sort_issues_by_severity(&mut issues);
        issues
    }

    /// Fetch and apply a full pass.
    pub async fn run_full_pass(&mut self) -> PassReport {
        self.run_pass(Scope::All).await
    }

    /// Fetch and apply an incremental pass over `element_ids`.
    pub async fn run_incremental_pass(
        &mut self,
        element_ids: impl IntoIterator<Item = String>,
    ) -> PassReport {
        self.run_pass(Scope::Elements(element_ids.into_iter().collect()))
            .await
    }

    async fn run_pass(&mut self, scope: Scope) -> PassReport {
        let started = tokio::time::Instant::now();
        let result = self.provider.snapshot(scope.clone()).await;
        let report = self.apply_pass(&scope, result, started.elapsed());
        self.persist_history().await;
        report
    }

    /// Fold a fetched snapshot into the current state and record the pass.
    ///
    /// `Scope::All` replaces every known element; `Scope::Elements` re-evaluates
    /// the listed ones and drops those the provider no longer returns. A
    /// provider failure leaves the known elements untouched.
    pub fn apply_pass(
        &mut self,
        scope: &Scope,
        result: Result<Vec<ElementSnapshot>, ProviderError>,
        elapsed: Duration,
    ) -> PassReport {
        let kind = match scope {
            Scope::All => PassKind::Full,
            Scope::Elements(_) => PassKind::Incremental,
        };
        let timestamp = Utc::now();

        let snapshots = match result {
            Ok(snapshots) => snapshots,
            Err(e) => {
                error!("{} pass aborted: {}", kind, e);
                let metadata = ReportMetadata {
                    timestamp,
                    kind,
                    wcag_level: self.classifier.level(),
                    elements_evaluated: self.outcomes.len(),
                    elements_examined: 0,
                    duration_ms: elapsed.as_millis() as u64,
                };
                let report = PassReport::failed(metadata, e.to_string());
                self.ledger.record(report.clone());
                self.sink.emit(MonitorEvent::PassCompleted(PassEvent::from(&report)));
                return report;
            }
        };

        let examined = snapshots.len();
        let (evaluated, skipped) = self.evaluate_all(&snapshots);

        match scope {
            Scope::All => {
                self.outcomes = evaluated;
                self.has_baseline = true;
            }
            Scope::Elements(ids) => {
                for id in ids {
                    self.outcomes.remove(id);
                }
                self.outcomes.extend(evaluated);
            }
        }

        let report = self.build_report(kind, timestamp, examined, skipped, elapsed);
        let mut event = PassEvent::from(&report);
        if self.ledger.record(report.clone()).is_some() {
            event.trend_change = self.change_on_append(timestamp);
        }
        self.sink.emit(MonitorEvent::PassCompleted(event));
        report
    }

    /// The significant change the history entry at `timestamp` introduced.
    fn change_on_append(&self, timestamp: DateTime<Utc>) -> Option<TrendChange> {
        let change = self.trend(timestamp).latest_change().cloned()?;
        debug!(
            "Trend change at {}: {:?} ({:+.1})",
            change.timestamp, change.direction, change.score_diff
        );
        Some(change)
    }

    fn evaluate_all(
        &self,
        snapshots: &[ElementSnapshot],
    ) -> (BTreeMap<String, ElementOutcome>, Vec<SkippedElement>) {
        let evaluator = ElementEvaluator::new(
            &self.classifier,
            self.rules.as_ref(),
            self.simulate_color_blindness,
        );

        let mut outcomes = BTreeMap::new();
        let mut skipped = Vec::new();
        for snapshot in snapshots {
            match evaluator.evaluate(snapshot) {
                Ok(outcome) => {
                    outcomes.insert(snapshot.id.clone(), outcome);
                }
                Err(e) => {
                    warn!("Skipping element {}: {}", snapshot.id, e);
                    skipped.push(SkippedElement {
                        element_id: snapshot.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        (outcomes, skipped)
    }

    fn build_report(
        &self,
        kind: PassKind,
        timestamp: DateTime<Utc>,
        examined: usize,
        skipped: Vec<SkippedElement>,
        elapsed: Duration,
    ) -> PassReport {
        let all = self.current_issues();
        let summary = IssueSummary::from_issues(&all);
        let recommendations = generate_advice(&all);
        let (warnings, issues): (Vec<Issue>, Vec<Issue>) =
            all.into_iter().partition(Issue::is_warning);

        let overall_score = overall_score(self.outcomes.values());
        debug!(
            "{} pass: {} known elements, score {:.1}",
            kind,
            self.outcomes.len(),
            overall_score
        );

        PassReport {
            metadata: ReportMetadata {
                timestamp,
                kind,
                wcag_level: self.classifier.level(),
                elements_evaluated: self.outcomes.len(),
                elements_examined: examined,
                duration_ms: elapsed.as_millis() as u64,
            },
            overall_score,
            grade: score_grade(overall_score).to_string(),
            category_scores: category_scores(self.outcomes.values()),
            issues,
            warnings,
            summary,
            skipped,
            recommendations,
            failed: false,
            failure: None,
        }
    }

    /// Write the history; a failure only switches storage to memory.
    pub async fn persist_history(&mut self) {
        let history = self.ledger.to_vec();
        if !self.persistence.save(HISTORY_KEY, &history).await {
            debug!("History kept in memory only");
        }
    }

    async fn persist_profiles(&mut self) {
        let stored = self.profiles.to_stored();
        let active = self.profiles.active_id().map(str::to_string);
        self.persistence.save(PROFILES_KEY, &stored).await;
        self.persistence.save(ACTIVE_PROFILE_KEY, &active).await;
    }

    pub fn latest_report(&self) -> Option<&PassReport> {
        self.ledger.latest_report()
    }

    /// The `limit` most recent run summaries, oldest first.
    pub fn history(&self, limit: usize) -> Vec<RunSummary> {
        self.ledger.recent(limit)
    }

    pub fn trend(&self, now: DateTime<Utc>) -> TrendAnalysis {
        self.trend.analyze(self.ledger.summaries(), now)
    }

    /// Rank every profile against `context` and emit the surfaced ones.
    pub fn recommendations(&self, context: &RecommendationContext) -> Recommendations {
        let result = self.recommender.recommend(self.profiles.all(), context);
        self.sink.emit(MonitorEvent::RecommendationsComputed(
            result.surfaced.iter().map(RecommendationEvent::from).collect(),
        ));
        result
    }

    /// Bundle the latest report with history, trend and recommendations.
    pub fn document(&self, context: &RecommendationContext) -> Option<ComplianceDocument> {
        let report = self.latest_report()?.clone();
        Some(ComplianceDocument {
            trend: self.trend(report.metadata.timestamp),
            history: self.ledger.to_vec(),
            recommendations: self.recommendations(context),
            report,
        })
    }

    pub fn profiles(&self) -> Vec<&Profile> {
        self.profiles.all()
    }

    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.get(id)
    }

    pub fn active_profile(&self) -> Option<&Profile> {
        self.profiles.active()
    }

    pub fn is_storage_degraded(&self) -> bool {
        self.persistence.is_degraded()
    }

    pub async fn create_profile(&mut self, new: NewProfile) -> Result<Profile, ProfileError> {
        let profile = self.profiles.create(new, Utc::now())?;
        self.persist_profiles().await;
        Ok(profile)
    }

    pub async fn update_profile(
        &mut self,
        id: &str,
        update: ProfileUpdate,
    ) -> Result<Profile, ProfileError> {
        let profile = self.profiles.update(id, update, Utc::now())?;
        self.persist_profiles().await;
        Ok(profile)
    }

    pub async fn delete_profile(&mut self, id: &str) -> Result<(), ProfileError> {
        self.profiles.delete(id, Utc::now())?;
        self.persist_profiles().await;
        Ok(())
    }

    pub async fn activate_profile(&mut self, id: &str) -> Result<Profile, ProfileError> {
        let profile = self.profiles.activate(id, Utc::now())?.clone();
        self.persist_profiles().await;
        Ok(profile)
    }

    pub async fn deactivate_profile(&mut self) -> Option<String> {
        let previous = self.profiles.deactivate(Utc::now());
        self.persist_profiles().await;
        previous
    }

    pub async fn record_satisfaction(&mut self, id: &str, sample: f64) -> Result<f64, ProfileError> {
        let score = self.profiles.record_satisfaction(id, sample)?;
        self.persist_profiles().await;
        Ok(score)
    }

    pub fn export_profile(&self, id: &str) -> Result<ProfileExport, ProfileError> {
        self.profiles.export(id, Utc::now())
    }

    pub async fn import_profile(
        &mut self,
        bundle: ProfileExport,
        overwrite: bool,
    ) -> Result<Profile, ProfileError> {
        let profile = self.profiles.import(bundle, overwrite, Utc::now())?;
        self.persist_profiles().await;
        Ok(profile)
    }

    pub async fn merge_profiles(
        &mut self,
        source_id: &str,
        target_id: &str,
        strategy: &MergeStrategy,
    ) -> Result<Profile, ProfileError> {
        let profile = self
            .profiles
            .merge(source_id, target_id, strategy, Utc::now())?;
        self.persist_profiles().await;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::ledger::TrendDirection;
    use crate::models::{IssueKind, Severity};
    use crate::profiles::presets::VISUAL_IMPAIRMENT;
    use crate::provider::StaticProvider;
    use crate::report::ChannelSink;
    use crate::storage::{KeyValueStore, MemoryStore, DEFAULT_STORAGE_TIMEOUT};
    use futures::future::BoxFuture;
    use futures::FutureExt;

    struct OfflineProvider;

    impl SnapshotProvider for OfflineProvider {
        fn snapshot(&self, _scope: Scope) -> BoxFuture<'_, Result<Vec<ElementSnapshot>, ProviderError>> {
            async { Err(ProviderError::Unavailable("offline".to_string())) }.boxed()
        }
    }

    fn gray(level: f64) -> Rgb {
        Rgb::new(level, level, level).unwrap()
    }

    fn surface() -> StaticProvider {
        StaticProvider::new(vec![
            ElementSnapshot::new("title", Rgb::BLACK, Rgb::WHITE),
            ElementSnapshot::new("faint", gray(230.0), Rgb::WHITE),
            ElementSnapshot::new("body", gray(80.0), Rgb::WHITE),
        ])
    }

    fn monitor(provider: StaticProvider) -> ComplianceMonitor {
        ComplianceMonitor::new(
            MonitorConfig::default(),
            Arc::new(provider),
            Persistence::in_memory(),
        )
    }

    #[tokio::test]
    async fn test_full_pass_scores_and_reports() {
        let mut monitor = monitor(surface());
        let report = monitor.run_full_pass().await;

        assert!(!report.failed);
        assert_eq!(report.metadata.kind, PassKind::Full);
        assert_eq!(report.metadata.elements_evaluated, 3);
        assert!((report.overall_score - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].element_id, "faint");
        assert_eq!(report.issues[0].severity, Severity::Critical);
        assert_eq!(monitor.history(10).len(), 1);
        assert!(monitor.has_baseline());
    }

    #[tokio::test]
    async fn test_incremental_pass_merges_by_element() {
        let provider = surface();
        let mut monitor = monitor(provider.clone());
        monitor.run_full_pass().await;

        provider.upsert(ElementSnapshot::new("faint", gray(60.0), Rgb::WHITE));
        provider.upsert(ElementSnapshot::new("new", gray(200.0), Rgb::WHITE));
        provider.remove("body");

        let report = monitor
            .run_incremental_pass(["faint".to_string(), "new".to_string(), "body".to_string()])
            .await;

        assert_eq!(report.metadata.kind, PassKind::Incremental);
        assert_eq!(report.metadata.elements_examined, 2);
        assert_eq!(monitor.known_elements(), 3);
        let failing: Vec<&str> = report
            .all_issues()
            .filter(|i| i.kind == IssueKind::Contrast)
            .map(|i| i.element_id.as_str())
            .collect();
        assert_eq!(failing, vec!["new"]);
    }

    #[tokio::test]
    async fn test_incremental_pass_leaves_other_elements_alone() {
        let provider = surface();
        let mut monitor = monitor(provider.clone());
        monitor.run_full_pass().await;

        provider.upsert(ElementSnapshot::new("title", gray(250.0), Rgb::WHITE));
        monitor.run_incremental_pass(["body".to_string()]).await;

        let ids: Vec<String> = monitor
            .current_issues()
            .into_iter()
            .map(|i| i.element_id)
            .collect();
        assert_eq!(ids, vec!["faint".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_color_is_skipped() {
        let mut bad = ElementSnapshot::new("broken", Rgb::BLACK, Rgb::WHITE);
        bad.foreground = crate::models::ColorValue::Triple([300.0, 0.0, 0.0]);
        let provider = StaticProvider::new(vec![
            bad,
            ElementSnapshot::new("ok", Rgb::BLACK, Rgb::WHITE),
        ]);

        let report = monitor(provider).run_full_pass().await;
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].element_id, "broken");
        assert_eq!(report.metadata.elements_evaluated, 1);
        assert_eq!(report.overall_score, 100.0);
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_previous_issues() {
        let mut healthy = monitor(surface());
        healthy.run_full_pass().await;
        let before = healthy.current_issues();

        let failed = healthy.apply_pass(
            &Scope::All,
            Err(ProviderError::Unavailable("offline".to_string())),
            Duration::ZERO,
        );
        assert!(failed.failed);
        assert_eq!(failed.issues_found(), 0);
        assert_eq!(healthy.history(10).len(), 1);
        assert_eq!(healthy.current_issues().len(), before.len());
        assert!(healthy.latest_report().unwrap().failed);

        let mut offline = ComplianceMonitor::new(
            MonitorConfig::default(),
            Arc::new(OfflineProvider),
            Persistence::in_memory(),
        );
        let report = offline.run_full_pass().await;
        assert!(report.failed);
        assert!(!offline.has_baseline());
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let (sink, mut rx) = ChannelSink::new();
        let mut monitor = monitor(surface()).with_sink(Arc::new(sink));
        monitor.run_full_pass().await;

        match rx.try_recv().unwrap() {
            MonitorEvent::PassCompleted(event) => {
                assert_eq!(event.issues.len(), 1);
                assert!(!event.failed);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let context = RecommendationContext {
            prefers_high_contrast: true,
            ..Default::default()
        };
        let recs = monitor.recommendations(&context);
        assert_eq!(recs.surfaced[0].profile_id, VISUAL_IMPAIRMENT);
        assert!(matches!(
            rx.try_recv().unwrap(),
            MonitorEvent::RecommendationsComputed(events) if events.len() == 1
        ));
    }

    #[tokio::test]
    async fn test_regression_is_reported_on_append() {
        let provider = surface();
        let (sink, mut rx) = ChannelSink::new();
        let mut monitor = monitor(provider.clone()).with_sink(Arc::new(sink));

        monitor.run_full_pass().await;
        match rx.try_recv().unwrap() {
            MonitorEvent::PassCompleted(event) => assert!(event.trend_change.is_none()),
            other => panic!("unexpected event: {:?}", other),
        }

        provider.upsert(ElementSnapshot::new("body", gray(230.0), Rgb::WHITE));
        let report = monitor.run_full_pass().await;
        assert!((report.overall_score - 100.0 / 3.0).abs() < 1e-9);

        match rx.try_recv().unwrap() {
            MonitorEvent::PassCompleted(event) => {
                let change = event.trend_change.expect("regression recorded");
                assert_eq!(change.direction, TrendDirection::Regression);
                assert_eq!(change.timestamp, report.metadata.timestamp);
                assert!((change.score_diff + 100.0 / 3.0).abs() < 1e-9);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        // A rerun with no change adds no significant shift.
        monitor.run_full_pass().await;
        match rx.try_recv().unwrap() {
            MonitorEvent::PassCompleted(event) => assert!(event.trend_change.is_none()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_state_survives_reload() {
        let store = Arc::new(MemoryStore::new());
        let mut first = ComplianceMonitor::new(
            MonitorConfig::default(),
            Arc::new(surface()),
            Persistence::new(store.clone(), DEFAULT_STORAGE_TIMEOUT),
        );
        first.run_full_pass().await;
        first.activate_profile(VISUAL_IMPAIRMENT).await.unwrap();
        let created = first
            .create_profile(NewProfile {
                name: "night".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut second = ComplianceMonitor::new(
            MonitorConfig::default(),
            Arc::new(surface()),
            Persistence::new(store.clone(), DEFAULT_STORAGE_TIMEOUT),
        );
        second.load().await;
        assert_eq!(second.history(10), first.history(10));
        assert!(second.profile(&created.id).is_some());
        assert_eq!(
            second.active_profile().map(|p| p.id.as_str()),
            Some(VISUAL_IMPAIRMENT)
        );
        assert!(store.get(HISTORY_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_profile_errors_are_results() {
        let mut monitor = monitor(surface());
        assert_eq!(
            monitor.activate_profile("missing").await.unwrap_err(),
            ProfileError::NotFound("missing".to_string())
        );
        assert_eq!(
            monitor.delete_profile(VISUAL_IMPAIRMENT).await.unwrap_err(),
            ProfileError::Immutable(VISUAL_IMPAIRMENT.to_string())
        );
    }

    #[tokio::test]
    async fn test_document_bundles_latest_pass() {
        let mut monitor = monitor(surface());
        assert!(monitor.document(&RecommendationContext::default()).is_none());

        monitor.run_full_pass().await;
        let doc = monitor.document(&RecommendationContext::default()).unwrap();
        assert_eq!(doc.history.len(), 1);
        assert_eq!(doc.trend.points.len(), 1);
    }
}
