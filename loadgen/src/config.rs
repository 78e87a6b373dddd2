use crate::error::ConfigError;
use clap::Parser;
use hyper::Uri;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

pub const DEFAULT_TARGET: &str = "https://figure.novakovic.be/figures/landing-page";
pub const DEFAULT_CONCURRENCY: usize = 1000;
pub const DEFAULT_DURATION: Duration = Duration::from_secs(30);
pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Per-state unit counts share one 64 bit word, 32 bits each.
pub const MAX_CONCURRENCY: usize = u32::MAX as usize;

/// Command line surface. Every flag can also come from a `LOADGEN_*` environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "loadgen")]
#[command(version, about = "Hammer one URL with a fixed number of virtual users", long_about = None)]
pub struct Args {
    /// url every virtual user requests with GET
    #[arg(long, env = "LOADGEN_URL", default_value = DEFAULT_TARGET)]
    pub url: String,

    /// number of concurrent virtual users
    #[arg(long, env = "LOADGEN_VUS", default_value_t = DEFAULT_CONCURRENCY)]
    pub vus: usize,

    /// how long to run, e.g. `30s`, `2m`, or plain seconds
    #[arg(long, env = "LOADGEN_DURATION", value_parser = parse_duration, default_value = "30s")]
    pub duration: Duration,

    /// pause after each request, e.g. `200ms` or `0.2`
    #[arg(long, env = "LOADGEN_SLEEP", value_parser = parse_duration, default_value = "200ms")]
    pub sleep: Duration,

    /// give up on a single request after this long
    #[arg(long, env = "LOADGEN_TIMEOUT", value_parser = parse_duration, default_value = "60s")]
    pub timeout: Duration,

    /// print the run report as json instead of a human-friendly format
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// debug logging as default instead of Info; use RUST_LOG env for more options
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    pub fn into_config(self) -> Result<RunConfig, ConfigError> {
        RunConfig::new(&self.url, self.vus, self.duration, self.sleep, self.timeout)
    }
}

/// Parameters of one run. Validated once, then only ever read.
#[derive(Debug, Clone)]
pub struct RunConfig {
    target: Uri,
    concurrency: NonZeroUsize,
    duration: Duration,
    inter_request_delay: Duration,
    request_timeout: Duration,
}

impl RunConfig {
    pub fn new(
        target: &str,
        concurrency: usize,
        duration: Duration,
        inter_request_delay: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let concurrency = NonZeroUsize::new(concurrency).ok_or(ConfigError::ZeroConcurrency)?;
        if concurrency.get() > MAX_CONCURRENCY {
            return Err(ConfigError::TooManyUnits {
                got: concurrency.get(),
                max: MAX_CONCURRENCY,
            });
        }
        if duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        if request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        // The driver computes its deadline from `Instant::now()`
        checked_run_time(duration, inter_request_delay, request_timeout)
            .and_then(|total| Instant::now().checked_add(total))
            .ok_or(ConfigError::RunTooLong)?;
        Ok(Self {
            target: parse_target(target)?,
            concurrency,
            duration,
            inter_request_delay,
            request_timeout,
        })
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> &Uri {
        &self.target
    }

    #[inline]
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency.get()
    }

    #[inline]
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[inline]
    #[must_use]
    pub fn inter_request_delay(&self) -> Duration {
        self.inter_request_delay
    }

    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Upper bound on how long a run with this config may take.
    #[must_use]
    pub fn max_run_time(&self) -> Duration {
        checked_run_time(self.duration, self.inter_request_delay, self.request_timeout)
            .unwrap_or(Duration::MAX)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target: Uri::from_static(DEFAULT_TARGET),
            concurrency: NonZeroUsize::new(DEFAULT_CONCURRENCY).unwrap_or(NonZeroUsize::MIN),
            duration: DEFAULT_DURATION,
            inter_request_delay: DEFAULT_DELAY,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

fn checked_run_time(duration: Duration, delay: Duration, timeout: Duration) -> Option<Duration> {
    duration.checked_add(delay)?.checked_add(timeout)
}

fn parse_target(input: &str) -> Result<Uri, ConfigError> {
    let uri: Uri = input.trim().parse().map_err(|source| ConfigError::InvalidUrl {
        input: input.to_owned(),
        source,
    })?;
    match uri.scheme_str() {
        Some("http" | "https") => {}
        _ => return Err(ConfigError::UnsupportedScheme(input.to_owned())),
    }
    if uri.host().map_or(true, str::is_empty) {
        return Err(ConfigError::MissingHost(input.to_owned()));
    }
    Ok(uri)
}

/// Accepts humantime spans (`30s`, `1m 30s`, `200ms`) as well as bare seconds (`0.2`).
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let trimmed = input.trim();
    let invalid = |reason: String| ConfigError::InvalidDuration {
        input: input.to_owned(),
        reason,
    };
    if let Ok(secs) = trimmed.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).map_err(|e| invalid(e.to_string()));
    }
    humantime::parse_duration(trimmed).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(target: &str, vus: usize, duration: Duration) -> Result<RunConfig, ConfigError> {
        RunConfig::new(target, vus, duration, DEFAULT_DELAY, DEFAULT_TIMEOUT)
    }

    #[test]
    fn defaults_match_original_script() {
        let args = Args::try_parse_from(["loadgen"]).unwrap();
        let cfg = args.into_config().unwrap();
        assert_eq!(DEFAULT_TARGET, cfg.target().to_string());
        assert_eq!(1000, cfg.concurrency());
        assert_eq!(Duration::from_secs(30), cfg.duration());
        assert_eq!(Duration::from_millis(200), cfg.inter_request_delay());
        assert_eq!(Duration::from_secs(60), cfg.request_timeout());

        let default = RunConfig::default();
        assert_eq!(cfg.target(), default.target());
        assert_eq!(cfg.concurrency(), default.concurrency());
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "loadgen",
            "--url",
            "http://127.0.0.1:8080/figures",
            "--vus",
            "4",
            "--duration",
            "1m 30s",
            "--sleep",
            "0.5",
            "--timeout",
            "5s",
            "--json",
        ])
        .unwrap();
        assert!(args.json);
        let cfg = args.into_config().unwrap();
        assert_eq!("127.0.0.1", cfg.target().host().unwrap());
        assert_eq!(4, cfg.concurrency());
        assert_eq!(Duration::from_secs(90), cfg.duration());
        assert_eq!(Duration::from_millis(500), cfg.inter_request_delay());
        assert_eq!(Duration::from_millis(95_500), cfg.max_run_time());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let err = config(DEFAULT_TARGET, 0, DEFAULT_DURATION).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroConcurrency));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn too_many_units_rejected() {
        let err = config(DEFAULT_TARGET, MAX_CONCURRENCY + 1, DEFAULT_DURATION).unwrap_err();
        assert!(matches!(err, ConfigError::TooManyUnits { .. }));
    }

    #[test]
    fn zero_duration_rejected() {
        let err = config(DEFAULT_TARGET, 1, Duration::ZERO).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroDuration));
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = RunConfig::new(DEFAULT_TARGET, 1, DEFAULT_DURATION, DEFAULT_DELAY, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout));
    }

    #[test]
    fn unschedulable_duration_rejected() {
        let args = Args::try_parse_from([
            "loadgen",
            "--vus",
            "1",
            "--duration",
            "500000000000y",
        ])
        .unwrap();
        assert!(matches!(args.into_config(), Err(ConfigError::RunTooLong)));

        let err = RunConfig::new(DEFAULT_TARGET, 1, DEFAULT_DURATION, DEFAULT_DELAY, Duration::MAX)
            .unwrap_err();
        assert!(matches!(err, ConfigError::RunTooLong));
    }

    #[test]
    fn long_but_schedulable_duration_allowed() {
        let cfg = config(DEFAULT_TARGET, 1, Duration::from_secs(365 * 24 * 3600)).unwrap();
        assert_eq!(
            Duration::from_secs(365 * 24 * 3600) + DEFAULT_DELAY + DEFAULT_TIMEOUT,
            cfg.max_run_time()
        );
    }

    #[test]
    fn zero_delay_allowed() {
        let cfg =
            RunConfig::new(DEFAULT_TARGET, 1, DEFAULT_DURATION, Duration::ZERO, DEFAULT_TIMEOUT)
                .unwrap();
        assert!(cfg.inter_request_delay().is_zero());
    }

    #[test]
    fn negative_duration_rejected() {
        assert!(matches!(
            parse_duration("-1"),
            Err(ConfigError::InvalidDuration { .. })
        ));
        assert!(Args::try_parse_from(["loadgen", "--duration", "-5s"]).is_err());
    }

    #[test]
    fn duration_formats() {
        assert_eq!(Duration::from_secs(30), parse_duration("30s").unwrap());
        assert_eq!(Duration::from_millis(200), parse_duration(".2").unwrap());
        assert_eq!(Duration::from_millis(250), parse_duration("250ms").unwrap());
        assert_eq!(Duration::from_secs(12), parse_duration(" 12 ").unwrap());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn bad_urls_rejected() {
        assert!(matches!(
            config("ftp://example.com/file", 1, DEFAULT_DURATION),
            Err(ConfigError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            config("figure.novakovic.be/figures", 1, DEFAULT_DURATION),
            Err(ConfigError::UnsupportedScheme(_) | ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            config("http://exa mple.com", 1, DEFAULT_DURATION),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            config("", 1, DEFAULT_DURATION),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }
}
