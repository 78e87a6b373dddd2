use hyper::http::uri::InvalidUri;
use hyper::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Rejected run parameters. Always raised before any request goes out.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("duration must be greater than zero")]
    ZeroDuration,
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
    #[error("at most {max} virtual users are supported, got {got}")]
    TooManyUnits { got: usize, max: usize },
    #[error("duration, sleep and timeout together are too long to schedule")]
    RunTooLong,
    #[error("invalid duration {input:?}: {reason}")]
    InvalidDuration { input: String, reason: String },
    #[error("invalid target url {input:?}")]
    InvalidUrl {
        input: String,
        #[source]
        source: InvalidUri,
    },
    #[error("unsupported scheme in {0:?}, expected http or https")]
    UnsupportedScheme(String),
    #[error("target url {0:?} has no host")]
    MissingHost(String),
}

/// A single failed iteration. Never stops the virtual user that hit it.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("failed to build request")]
    Build(#[source] hyper::http::Error),
    #[error("failed to send request")]
    Send(#[source] hyper_util::client::legacy::Error),
    #[error("failed to read response body: {0:#}")]
    Body(anyhow::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl RequestError {
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
