use crate::error::RequestError;
use bytes::Bytes;
use http_body_util::Full;
use http_test_util::drain::DiscardBodyFuture;
use http_test_util::empty_body;
use hyper::{Request, StatusCode, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

/// What is left of a successful exchange once the body has been thrown away.
#[derive(Debug, Copy, Clone)]
pub struct Fetched {
    pub status: StatusCode,
    pub body_len: usize,
}

/// Pooled HTTP/1.1 + HTTP/2 client, TLS through rustls. Clones share the pool.
#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    timeout: Duration,
}

impl HttpClient {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        // Fails only when a provider is already installed
        let _ = rustls::crypto::ring::default_provider().install_default();

        let builder = match HttpsConnectorBuilder::new().with_native_roots() {
            Ok(builder) => builder,
            Err(err) => {
                tracing::warn!(%err, "no native root certificates loaded, https targets will fail");
                HttpsConnectorBuilder::new().with_tls_config(
                    rustls::ClientConfig::builder()
                        .with_root_certificates(rustls::RootCertStore::empty())
                        .with_no_client_auth(),
                )
            }
        };
        let connector = builder
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client, timeout }
    }

    /// Issues one GET without headers or body and drains the response.
    /// Anything but a 2xx answer within the timeout is an error.
    pub async fn get(&self, uri: &Uri) -> Result<Fetched, RequestError> {
        let request = Request::get(uri.clone())
            .body(empty_body())
            .map_err(RequestError::Build)?;
        let exchange = async {
            let resp = self
                .client
                .request(request)
                .await
                .map_err(RequestError::Send)?;
            let status = resp.status();
            // Drain even on failure so the connection goes back to the pool
            let body_len = DiscardBodyFuture::new(resp.into_body())
                .await
                .map_err(RequestError::Body)?;
            if !status.is_success() {
                return Err(RequestError::Status(status));
            }
            Ok(Fetched { status, body_len })
        };
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_elapsed| RequestError::Timeout(self.timeout))?
    }
}
