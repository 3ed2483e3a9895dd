//! Periodic refresh with single-snapshot replacement.
//!
//! The scheduler owns the only shared mutable state: the published
//! [`RefreshState`]. It is swapped whole through a `watch` channel, so a
//! reader sees either the previous complete snapshot or the new one.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, error, info, warn};

use crate::config::SourceConfig;
use crate::error::PipelineError;
use crate::fetch::HttpClient;
use crate::pipeline::run_cycle;
use crate::record::MergedDataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Refreshing,
}

/// A published dataset and when it was built.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub dataset: Arc<MergedDataset>,
    pub refreshed_at: DateTime<Utc>,
    pub cycle: u64,
}

/// What consumers observe.
///
/// `snapshot` is `None` until the first successful cycle. `last_error` is
/// set by a failed cycle and cleared by the next successful one; a failure
/// never discards the snapshot.
#[derive(Debug, Clone)]
pub struct RefreshState {
    pub phase: Phase,
    pub snapshot: Option<Snapshot>,
    pub last_error: Option<Arc<PipelineError>>,
}

impl RefreshState {
    fn initial() -> Self {
        Self {
            phase: Phase::Refreshing,
            snapshot: None,
            last_error: None,
        }
    }

    pub fn dataset(&self) -> Option<&MergedDataset> {
        self.snapshot.as_ref().map(|s| s.dataset.as_ref())
    }

    /// The snapshot, if it was published after cycle `seen`. Independent
    /// of `last_error`, since a watcher may only observe a failure that
    /// followed an unseen success.
    pub fn snapshot_since(&self, seen: u64) -> Option<&Snapshot> {
        self.snapshot.as_ref().filter(|s| s.cycle > seen)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Published { records: usize },
    Failed,
    /// Another cycle was already running.
    Skipped,
}

struct Inner<C> {
    client: C,
    sources: Vec<SourceConfig>,
    period: Duration,
    state: watch::Sender<RefreshState>,
    in_flight: AtomicBool,
    retry: Notify,
    cycles: AtomicU64,
}

/// Clears the in-flight flag even if the cycle unwinds.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<C: HttpClient> Inner<C> {
    async fn run_guarded(&self) -> CycleOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Refresh already in flight, skipping");
            return CycleOutcome::Skipped;
        }
        let _guard = InFlight(&self.in_flight);

        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        self.state.send_modify(|s| s.phase = Phase::Refreshing);

        let span = tracing::info_span!("refresh_cycle", cycle);
        match run_cycle(&self.client, &self.sources).instrument(span).await {
            Ok(dataset) => {
                let records = dataset.len();
                self.state.send_modify(|s| {
                    s.phase = Phase::Idle;
                    s.snapshot = Some(Snapshot {
                        dataset: Arc::new(dataset),
                        refreshed_at: Utc::now(),
                        cycle,
                    });
                    s.last_error = None;
                });
                info!(cycle, records, "Snapshot published");
                CycleOutcome::Published { records }
            }
            Err(e) => {
                error!(cycle, url = e.url(), error = %e, "Refresh cycle failed");
                self.state.send_modify(|s| {
                    s.phase = Phase::Idle;
                    s.last_error = Some(Arc::new(e));
                });
                CycleOutcome::Failed
            }
        }
    }
}

/// Runs the fetch → merge → derive cycle on demand and on a fixed period.
pub struct RefreshScheduler<C> {
    inner: Arc<Inner<C>>,
}

impl<C: HttpClient + 'static> RefreshScheduler<C> {
    /// Fails if `period` is zero.
    pub fn new(client: C, sources: Vec<SourceConfig>, period: Duration) -> Result<Self> {
        if period.is_zero() {
            bail!("refresh period must be greater than zero");
        }
        let (state, _) = watch::channel(RefreshState::initial());
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                sources,
                period,
                state,
                in_flight: AtomicBool::new(false),
                retry: Notify::new(),
                cycles: AtomicU64::new(0),
            }),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<RefreshState> {
        self.inner.state.subscribe()
    }

    /// A clone of the current state.
    pub fn state(&self) -> RefreshState {
        self.inner.state.borrow().clone()
    }

    /// Runs one cycle now, unless one is already in flight.
    pub async fn refresh_now(&self) -> CycleOutcome {
        self.inner.run_guarded().await
    }

    /// Asks a started scheduler to run a cycle without waiting for the next
    /// tick. A request made before [`start`](Self::start) fires once it runs.
    pub fn request_refresh(&self) {
        self.inner.retry.notify_one();
    }

    /// Spawns the timer loop. The first cycle starts immediately and the
    /// next one every period after, whether or not the previous cycle has
    /// finished; a tick that lands on a running cycle is skipped.
    ///
    /// Dropping the returned handle stops the timer as well.
    pub fn start(&self) -> SchedulerHandle {
        let inner = Arc::clone(&self.inner);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                period_secs = inner.period.as_secs(),
                sources = inner.sources.len(),
                "Refresh scheduler started"
            );

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {}
                    _ = inner.retry.notified() => debug!("Manual refresh requested"),
                }

                let inner = Arc::clone(&inner);
                tokio::spawn(async move {
                    inner.run_guarded().await;
                });
            }

            info!("Refresh scheduler stopped");
        });

        SchedulerHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

/// Owns a running timer loop.
pub struct SchedulerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the timer and waits for the loop to exit. A cycle already in
    /// flight is not cancelled and still publishes its result.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "Refresh scheduler loop ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    const A: &str = "https://sheets.example/a.csv";
    const B: &str = "https://sheets.example/b.csv";

    #[derive(Default)]
    struct FakeSheets {
        responses: Mutex<HashMap<String, (u16, String)>>,
        hits: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl FakeSheets {
        fn serve(&self, url: &str, status: u16, body: &str) {
            self.responses
                .lock()
                .unwrap()
                .insert(url.to_string(), (status, body.to_string()));
        }
    }

    #[async_trait]
    impl HttpClient for Arc<FakeSheets> {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let (status, body) = self
                .responses
                .lock()
                .unwrap()
                .get(req.url().as_str())
                .cloned()
                .unwrap_or((404, String::new()));
            let resp = http::Response::builder().status(status).body(body).unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }

    fn sources() -> Vec<SourceConfig> {
        vec![SourceConfig::new(A, "CSD-A"), SourceConfig::new(B, "CSD-B")]
    }

    fn scheduler(fake: &Arc<FakeSheets>) -> RefreshScheduler<Arc<FakeSheets>> {
        RefreshScheduler::new(Arc::clone(fake), sources(), Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn test_initial_state_is_first_load() {
        let fake = Arc::new(FakeSheets::default());
        let state = scheduler(&fake).state();
        assert_eq!(state.phase, Phase::Refreshing);
        assert!(state.snapshot.is_none());
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_zero_period_rejected() {
        let fake = Arc::new(FakeSheets::default());
        let err = RefreshScheduler::new(fake, sources(), Duration::ZERO)
            .err()
            .expect("zero period rejected");
        assert!(err.to_string().contains("greater than zero"));
    }

    #[tokio::test]
    async fn test_first_failure_has_no_data_and_an_error() {
        let fake = Arc::new(FakeSheets::default());
        fake.serve(A, 200, "USN,Total\n1CD21,70\n");
        fake.serve(B, 500, "boom");
        let scheduler = scheduler(&fake);

        assert_eq!(scheduler.refresh_now().await, CycleOutcome::Failed);

        let state = scheduler.state();
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.snapshot.is_none());
        let err = state.last_error.expect("error published");
        assert_eq!(err.url(), B);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_snapshot() {
        let fake = Arc::new(FakeSheets::default());
        fake.serve(A, 200, "USN,Total\n1CD21,70\n");
        fake.serve(B, 200, "USN,Total\n1CD51,64\n1CD52,81\n");
        let scheduler = scheduler(&fake);

        assert_eq!(
            scheduler.refresh_now().await,
            CycleOutcome::Published { records: 3 }
        );

        fake.serve(A, 503, "");
        assert_eq!(scheduler.refresh_now().await, CycleOutcome::Failed);

        let state = scheduler.state();
        let snapshot = state.snapshot.as_ref().expect("snapshot retained");
        assert_eq!(snapshot.cycle, 1);
        assert_eq!(snapshot.dataset.len(), 3);
        assert_eq!(state.last_error.as_ref().map(|e| e.url()), Some(A));
    }

    #[tokio::test]
    async fn test_success_replaces_snapshot_and_clears_error() {
        let fake = Arc::new(FakeSheets::default());
        fake.serve(A, 200, "USN,Total\n1CD21,70\n");
        fake.serve(B, 404, "");
        let scheduler = scheduler(&fake);
        assert_eq!(scheduler.refresh_now().await, CycleOutcome::Failed);

        fake.serve(B, 200, "USN,Total\n1CD51,64\n");
        assert_eq!(
            scheduler.refresh_now().await,
            CycleOutcome::Published { records: 2 }
        );

        let state = scheduler.state();
        assert!(state.last_error.is_none());
        let dataset = state.dataset().expect("snapshot published");
        let usns: Vec<&str> = dataset
            .records()
            .iter()
            .filter_map(|r| r.usn.as_deref())
            .collect();
        assert_eq!(usns, vec!["1CD21", "1CD51"]);
        assert_eq!(state.snapshot.as_ref().map(|s| s.cycle), Some(2));
    }

    #[tokio::test]
    async fn test_overlapping_cycle_is_skipped() {
        let gate = Arc::new(Notify::new());
        let fake = Arc::new(FakeSheets {
            gate: Some(Arc::clone(&gate)),
            ..Default::default()
        });
        fake.serve(A, 200, "USN,Total\n1CD21,70\n");
        let scheduler = RefreshScheduler::new(
            Arc::clone(&fake),
            vec![SourceConfig::new(A, "CSD-A")],
            Duration::from_secs(10),
        )
        .unwrap();

        let first = scheduler.refresh_now();
        let second = async {
            tokio::task::yield_now().await;
            let outcome = scheduler.refresh_now().await;
            gate.notify_one();
            outcome
        };
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first, CycleOutcome::Published { records: 1 });
        assert_eq!(second, CycleOutcome::Skipped);
        assert_eq!(fake.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unseen_success_visible_behind_later_failure() {
        let fake = Arc::new(FakeSheets::default());
        fake.serve(A, 200, "USN,Total\n1CD21,70\n");
        fake.serve(B, 200, "USN,Total\n1CD51,64\n");
        let scheduler = scheduler(&fake);
        let mut rx = scheduler.subscribe();

        scheduler.refresh_now().await;
        fake.serve(B, 500, "");
        scheduler.refresh_now().await;

        let state = rx.borrow_and_update().clone();
        assert!(state.last_error.is_some());
        let snapshot = state.snapshot_since(0).expect("success still reported");
        assert_eq!(snapshot.cycle, 1);
        assert!(state.snapshot_since(1).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_refreshes_every_period() {
        let fake = Arc::new(FakeSheets::default());
        fake.serve(A, 200, "USN,Total\n1CD21,70\n");
        fake.serve(B, 200, "USN,Total\n1CD51,64\n");
        let scheduler = scheduler(&fake);

        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_secs(25)).await;
        handle.stop().await;

        // Ticks at 0s, 10s and 20s, two sources each.
        assert_eq!(fake.hits.load(Ordering::SeqCst), 6);
        let state = scheduler.state();
        assert_eq!(state.snapshot.as_ref().map(|s| s.cycle), Some(3));
        assert_eq!(state.phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh_runs_between_ticks() {
        let fake = Arc::new(FakeSheets::default());
        fake.serve(A, 500, "");
        fake.serve(B, 200, "USN,Total\n1CD51,64\n");
        let scheduler = scheduler(&fake);
        let mut rx = scheduler.subscribe();

        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(scheduler.state().last_error.is_some());

        fake.serve(A, 200, "USN,Total\n1CD21,70\n");
        scheduler.request_refresh();
        rx.wait_for(|s| s.snapshot.is_some()).await.unwrap();
        handle.stop().await;

        let state = scheduler.state();
        assert!(state.last_error.is_none());
        assert_eq!(state.dataset().map(MergedDataset::len), Some(2));
        assert_eq!(fake.hits.load(Ordering::SeqCst), 4);
    }
}
