use crate::client::Fetched;
use crate::config::RunConfig;
use crate::error::RequestError;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Running min/mean/max of round trip times, in microseconds.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LatencySummary {
    samples: u64,
    min_us: u64,
    max_us: u64,
    total_us: u64,
}

impl LatencySummary {
    pub fn record(&mut self, rtt: Duration) {
        let cur = u64::try_from(rtt.as_micros()).unwrap_or(u64::MAX);
        if self.samples == 0 {
            self.min_us = cur;
            self.max_us = cur;
        } else {
            self.min_us = self.min_us.min(cur);
            self.max_us = self.max_us.max(cur);
        }
        self.samples += 1;
        self.total_us = self.total_us.saturating_add(cur);
    }

    pub fn merge(&mut self, other: &Self) {
        if other.samples == 0 {
            return;
        }
        if self.samples == 0 {
            *self = *other;
            return;
        }
        self.min_us = self.min_us.min(other.min_us);
        self.max_us = self.max_us.max(other.max_us);
        self.samples += other.samples;
        self.total_us = self.total_us.saturating_add(other.total_us);
    }

    #[inline]
    #[must_use]
    pub fn samples(&self) -> u64 {
        self.samples
    }

    #[inline]
    #[must_use]
    pub fn min(&self) -> Option<Duration> {
        (self.samples > 0).then(|| Duration::from_micros(self.min_us))
    }

    #[inline]
    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        (self.samples > 0).then(|| Duration::from_micros(self.max_us))
    }

    #[must_use]
    pub fn mean_us(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.total_us as f64 / self.samples as f64
    }
}

impl Serialize for LatencySummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("LatencySummary", 4)?;
        s.serialize_field("samples", &self.samples)?;
        s.serialize_field("min_us", &self.min_us)?;
        s.serialize_field("mean_us", &self.mean_us())?;
        s.serialize_field("max_us", &self.max_us)?;
        s.end()
    }
}

/// What one virtual user did over the run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UnitReport {
    pub unit: usize,
    pub iterations: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub bytes_received: u64,
    pub latency: LatencySummary,
}

impl UnitReport {
    #[must_use]
    pub fn new(unit: usize) -> Self {
        Self {
            unit,
            ..Self::default()
        }
    }

    /// Records the request half of an iteration. Failed requests have no latency sample.
    pub fn record(&mut self, rtt: Duration, result: &Result<Fetched, RequestError>) {
        match result {
            Ok(fetched) => {
                self.latency.record(rtt);
                self.bytes_received += fetched.body_len as u64;
            }
            Err(err) => {
                self.failures += 1;
                if err.is_timeout() {
                    self.timeouts += 1;
                }
            }
        }
    }

    #[inline]
    pub fn complete_iteration(&mut self) {
        self.iterations += 1;
    }
}

/// Everything the driver knows once every unit has stopped.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub target: String,
    pub concurrency: usize,
    #[serde(serialize_with = "as_millis")]
    pub duration: Duration,
    #[serde(serialize_with = "as_millis")]
    pub inter_request_delay: Duration,
    #[serde(serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub iterations: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub bytes_received: u64,
    pub latency: LatencySummary,
    pub units: Vec<UnitReport>,
}

impl RunReport {
    #[must_use]
    pub fn new(config: &RunConfig, elapsed: Duration, mut units: Vec<UnitReport>) -> Self {
        units.sort_by_key(|u| u.unit);
        let mut latency = LatencySummary::default();
        let (mut iterations, mut failures, mut timeouts, mut bytes_received) = (0, 0, 0, 0);
        for unit in &units {
            iterations += unit.iterations;
            failures += unit.failures;
            timeouts += unit.timeouts;
            bytes_received += unit.bytes_received;
            latency.merge(&unit.latency);
        }
        Self {
            target: config.target().to_string(),
            concurrency: config.concurrency(),
            duration: config.duration(),
            inter_request_delay: config.inter_request_delay(),
            elapsed,
            iterations,
            failures,
            timeouts,
            bytes_received,
            latency,
            units,
        }
    }

    /// Fewest and most iterations completed by any single unit.
    #[must_use]
    pub fn iteration_spread(&self) -> (u64, u64) {
        let min = self.units.iter().map(|u| u.iterations).min().unwrap_or(0);
        let max = self.units.iter().map(|u| u.iterations).max().unwrap_or(0);
        (min, max)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (min_iter, max_iter) = self.iteration_spread();
        let mean_iter = if self.units.is_empty() {
            0.0
        } else {
            self.iterations as f64 / self.units.len() as f64
        };
        let min_rtt = self.latency.min().map_or(0, |d| d.as_micros());
        let max_rtt = self.latency.max().map_or(0, |d| d.as_micros());
        write!(
            f,
            "\
Results:
    target                               = {}
    virtual users                        = {}
    elapsed                              = {:.2?}
    iterations [total, failed, timeout]  = [{}, {}, {}]
    per unit   [min, mean, max]          = [{}, {:.2}, {}]
    rtt us     [min, mean, max]          = [{}, {:.2}, {}]
    received bytes                       = {}",
            self.target,
            self.concurrency,
            self.elapsed,
            self.iterations,
            self.failures,
            self.timeouts,
            min_iter,
            mean_iter,
            max_iter,
            min_rtt,
            self.latency.mean_us(),
            max_rtt,
            self.bytes_received,
        )
    }
}

fn as_millis<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(d.as_millis())
}
