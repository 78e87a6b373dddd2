use crate::client::HttpClient;
use crate::config::RunConfig;
use crate::statistics::{RunReport, UnitReport};
use anyhow::Context;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one virtual user. States only move forward; `Stopped` is terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum UnitState {
    Running,
    /// Stop was signalled; the iteration underway, if any, still completes.
    Draining,
    Stopped,
}

impl UnitState {
    /// Contribution to the packed per-state word in `ActiveUnits`.
    #[inline]
    fn weight(self) -> u64 {
        match self {
            UnitState::Running => 1,
            UnitState::Draining => 1 << 32,
            UnitState::Stopped => 0,
        }
    }
}

/// Live per-state unit counts, shared between the driver and its units.
#[derive(Clone, Default)]
pub struct ActiveUnits {
    /// Running units in the low 32 bits, draining units in the high 32 bits.
    states: Arc<AtomicU64>,
    stopped: Arc<AtomicUsize>,
}

impl ActiveUnits {
    /// Number of units currently `Running` or `Draining`.
    #[inline]
    #[must_use]
    pub fn get(&self) -> usize {
        let (running, draining) = self.snapshot();
        running + draining
    }

    #[must_use]
    pub fn count(&self, state: UnitState) -> usize {
        match state {
            UnitState::Running => self.snapshot().0,
            UnitState::Draining => self.snapshot().1,
            UnitState::Stopped => self.stopped.load(Ordering::Acquire),
        }
    }

    fn snapshot(&self) -> (usize, usize) {
        let word = self.states.load(Ordering::Acquire);
        ((word & u64::from(u32::MAX)) as usize, (word >> 32) as usize)
    }

    fn enter(&self, unit: usize) -> UnitGuard {
        self.states
            .fetch_add(UnitState::Running.weight(), Ordering::AcqRel);
        UnitGuard {
            unit,
            state: UnitState::Running,
            units: self.clone(),
        }
    }
}

/// A unit's entry in `ActiveUnits`. Dropping it, even on panic, moves the unit to `Stopped`.
struct UnitGuard {
    unit: usize,
    state: UnitState,
    units: ActiveUnits,
}

impl UnitGuard {
    fn advance(&mut self, next: UnitState) {
        if next <= self.state {
            return;
        }
        // Single atomic step, a reader never sees the unit missing or counted twice
        let delta = next.weight().wrapping_sub(self.state.weight());
        self.units.states.fetch_add(delta, Ordering::AcqRel);
        if next == UnitState::Stopped {
            self.units.stopped.fetch_add(1, Ordering::AcqRel);
        }
        tracing::trace!(unit = self.unit, from = ?self.state, to = ?next, "virtual user state");
        self.state = next;
    }
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        self.advance(UnitState::Stopped);
    }
}

pub struct LoadDriver {
    config: Arc<RunConfig>,
    client: HttpClient,
    active: ActiveUnits,
}

impl LoadDriver {
    #[must_use]
    pub fn new(config: RunConfig, client: HttpClient) -> Self {
        Self {
            config: Arc::new(config),
            client,
            active: ActiveUnits::default(),
        }
    }

    #[must_use]
    pub fn active_units(&self) -> ActiveUnits {
        self.active.clone()
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs for the configured duration.
    pub async fn run(self) -> anyhow::Result<RunReport> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs for the configured duration, or until `interrupt` resolves if that comes first.
    /// Either way every unit is allowed to finish the iteration it is in.
    pub async fn run_until<F: Future>(self, interrupt: F) -> anyhow::Result<RunReport> {
        let concurrency = self.config.concurrency();
        let stop = CancellationToken::new();
        let start = Instant::now();
        let deadline = start
            .checked_add(self.config.duration())
            .context("Run duration does not fit the clock")?;
        tracing::info!(
            target_url = %self.config.target(),
            concurrency,
            duration = ?self.config.duration(),
            inter_request_delay = ?self.config.inter_request_delay(),
            request_timeout = ?self.config.request_timeout(),
            "starting load run",
        );

        let mut units = Vec::with_capacity(concurrency);
        for unit in 0..concurrency {
            let guard = self.active.enter(unit);
            units.push(tokio::spawn(run_unit(
                unit,
                guard,
                self.client.clone(),
                self.config.clone(),
                stop.clone(),
            )));
        }

        tokio::select! {
            () = tokio::time::sleep_until(deadline) => {
                tracing::info!("duration elapsed, stopping virtual users");
            }
            _ = interrupt => {
                tracing::info!(elapsed = ?start.elapsed(), "interrupted, stopping virtual users early");
            }
        }
        stop.cancel();

        let mut reports = Vec::with_capacity(concurrency);
        for t in units {
            reports.push(t.await.context("Failed to join virtual user")?);
        }
        let elapsed = start.elapsed();
        tracing::info!(?elapsed, "all virtual users stopped");
        Ok(RunReport::new(&self.config, elapsed, reports))
    }
}

async fn run_unit(
    unit: usize,
    mut guard: UnitGuard,
    client: HttpClient,
    config: Arc<RunConfig>,
    stop: CancellationToken,
) -> UnitReport {
    let mut report = UnitReport::new(unit);

    while !stop.is_cancelled() {
        let iteration = run_iteration(unit, &client, &config, &mut report);
        tokio::pin!(iteration);
        tokio::select! {
            biased;
            () = &mut iteration => {}
            () = stop.cancelled() => {
                guard.advance(UnitState::Draining);
                iteration.await;
            }
        }
    }

    guard.advance(UnitState::Draining);
    guard.advance(UnitState::Stopped);
    tracing::trace!(unit, iterations = report.iterations, "virtual user done");
    report
}

/// One request followed by the pause, neither of which is ever cut short.
async fn run_iteration(
    unit: usize,
    client: &HttpClient,
    config: &RunConfig,
    report: &mut UnitReport,
) {
    let (rtt, res) = run_timed(client.get(config.target())).await;
    if let Err(err) = &res {
        tracing::debug!(unit, error = %err, "request failed");
    }
    report.record(rtt, &res);
    if config.inter_request_delay().is_zero() {
        // Never hog a worker thread against an instantly failing target
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(config.inter_request_delay()).await;
    }
    report.complete_iteration();
}

#[inline]
async fn run_timed<T, F: Future<Output = T>>(fut: F) -> (Duration, T) {
    let start = Instant::now();
    let res = fut.await;
    (start.elapsed(), res)
}
