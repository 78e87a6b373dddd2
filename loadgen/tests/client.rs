use http_test_util::target::{unused_addr, TargetBehavior, TargetServer};
use hyper::{StatusCode, Uri};
use loadgen::{HttpClient, RequestError};
use std::time::Duration;

fn uri(s: &str) -> Uri {
    s.parse().unwrap()
}

#[tokio::test]
async fn get_discards_body_and_reports_length() {
    let server = TargetServer::spawn(TargetBehavior::default()).await.unwrap();
    let client = HttpClient::new(Duration::from_secs(5));
    let fetched = client
        .get(&uri(&server.url("/figures/landing-page")))
        .await
        .unwrap();
    assert_eq!(StatusCode::OK, fetched.status);
    assert_eq!(TargetBehavior::default().body.len(), fetched.body_len);
    assert_eq!(1, server.hits());
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = TargetServer::spawn(TargetBehavior::default().with_status(StatusCode::NOT_FOUND))
        .await
        .unwrap();
    let client = HttpClient::new(Duration::from_secs(5));
    let err = client.get(&uri(&server.url("/"))).await.unwrap_err();
    assert!(matches!(err, RequestError::Status(StatusCode::NOT_FOUND)));
}

#[tokio::test]
async fn slow_target_times_out() {
    let server = TargetServer::spawn(
        TargetBehavior::default().with_latency(Duration::from_secs(5)),
    )
    .await
    .unwrap();
    let client = HttpClient::new(Duration::from_millis(100));
    let err = client.get(&uri(&server.url("/"))).await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn refused_connection_is_a_send_error() {
    let addr = unused_addr().await.unwrap();
    let client = HttpClient::new(Duration::from_secs(5));
    let err = client
        .get(&uri(&format!("http://{addr}/")))
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::Send(_)));
}
