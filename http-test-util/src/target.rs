//! A tiny HTTP/1.1 server to point load runs at from tests.
use crate::{byte_body, HitCounter};
use anyhow::Context;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// How the target answers every request, regardless of method or path.
#[derive(Debug, Clone)]
pub struct TargetBehavior {
    pub status: StatusCode,
    pub latency: Duration,
    pub body: Bytes,
}

impl Default for TargetBehavior {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            latency: Duration::ZERO,
            body: Bytes::from_static(b"<html>landing page</html>"),
        }
    }
}

impl TargetBehavior {
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

pub struct TargetServer {
    addr: SocketAddr,
    hits: HitCounter,
    accept: JoinHandle<()>,
}

impl TargetServer {
    /// Binds an ephemeral port on localhost and starts accepting connections.
    pub async fn spawn(behavior: TargetBehavior) -> anyhow::Result<Self> {
        let sock = TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind target server")?;
        let addr = sock.local_addr().context("Failed to read target address")?;
        let hits = HitCounter::new();
        let accept = tokio::task::spawn(run_accept(sock, hits.clone(), Arc::new(behavior)));
        Ok(Self { addr, hits, accept })
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    #[inline]
    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.get()
    }
}

impl Drop for TargetServer {
    fn drop(&mut self) {
        self.accept.abort();
    }
}

/// An address nothing listens on, for exercising connect failures.
pub async fn unused_addr() -> anyhow::Result<SocketAddr> {
    let sock = TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind probe socket")?;
    sock.local_addr().context("Failed to read probe address")
}

async fn run_accept(sock: TcpListener, hits: HitCounter, behavior: Arc<TargetBehavior>) {
    loop {
        let Ok((tcp, _peer)) = sock.accept().await else {
            continue;
        };
        let tcp = TokioIo::new(tcp);
        let hits = hits.clone();
        let behavior = behavior.clone();
        tokio::task::spawn(hyper::server::conn::http1::Builder::new().serve_connection(
            tcp,
            service_fn(move |req| respond(hits.clone(), behavior.clone(), req)),
        ));
    }
}

async fn respond(
    hits: HitCounter,
    behavior: Arc<TargetBehavior>,
    _incoming: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::http::Error> {
    hits.hit();
    if !behavior.latency.is_zero() {
        tokio::time::sleep(behavior.latency).await;
    }
    Response::builder()
        .status(behavior.status)
        .body(byte_body(behavior.body.clone()))
}
