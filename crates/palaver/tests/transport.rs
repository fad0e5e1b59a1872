use anyhow::Result;
use palaver::transport::{
    cache_key, CachingTransport, FileCache, HttpRequest, MemoryCache, ReqwestTransport,
    ResponseCache, RetryTransport, Transport,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup_mock_server(status: u16, body: serde_json::Value) -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/echo"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&mock_server)
        .await;
    mock_server
}

#[tokio::test]
async fn test_retry_on_429_honors_retry_after() -> Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/echo"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/echo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let transport = RetryTransport::new(ReqwestTransport::new()?);
    let request = HttpRequest::post_json(format!("{}/v1/echo", mock_server.uri()), &json!({}));
    let response = transport.send(request).await?;

    assert_eq!(response.status, 200);
    assert_eq!(response.json()?, json!({"ok": true}));
    Ok(())
}

#[tokio::test]
async fn test_retry_gives_up_after_max_retries() -> Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/echo"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let transport = RetryTransport::new(ReqwestTransport::new()?)
        .with_max_retries(2)
        .with_base_delay(Duration::from_millis(1));
    let request = HttpRequest::post_json(format!("{}/v1/echo", mock_server.uri()), &json!({}));
    let response = transport.send(request).await?;

    assert_eq!(response.status, 429);
    Ok(())
}

#[tokio::test]
async fn test_caching_serves_repeated_requests() -> Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/echo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"n": 1})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let transport = CachingTransport::new(ReqwestTransport::new()?, MemoryCache::new());
    let url = format!("{}/v1/echo", mock_server.uri());
    let request = HttpRequest::post_json(&url, &json!({"q": "a"}));

    let first = transport.send(request.clone()).await?;
    let second = transport.send(request.clone()).await?;
    assert_eq!(first, second);

    // a different body misses the cache
    transport
        .send(HttpRequest::post_json(&url, &json!({"q": "b"})))
        .await?;

    transport.cache().invalidate(&cache_key(&request)).await?;
    assert!(transport.cache().get(&cache_key(&request)).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_failures_are_not_cached() -> Result<()> {
    let mock_server = setup_mock_server(500, json!({"error": "boom"})).await;
    let dir = tempfile::tempdir()?;

    let transport = CachingTransport::new(ReqwestTransport::new()?, FileCache::new(dir.path()));
    let request = HttpRequest::post_json(format!("{}/v1/echo", mock_server.uri()), &json!({}));
    let response = transport.send(request.clone()).await?;

    assert_eq!(response.status, 500);
    assert!(transport.cache().get(&cache_key(&request)).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_file_cache_persists_responses() -> Result<()> {
    let mock_server = setup_mock_server(200, json!({"cached": true})).await;
    let dir = tempfile::tempdir()?;
    let request = HttpRequest::post_json(format!("{}/v1/echo", mock_server.uri()), &json!({}));

    let transport = CachingTransport::new(ReqwestTransport::new()?, FileCache::new(dir.path()));
    transport.send(request.clone()).await?;

    let entry = dir.path().join(format!("{}.json", cache_key(&request)));
    assert!(entry.exists());

    // a fresh cache over the same directory hits without the network
    let reopened = FileCache::new(dir.path());
    let cached = reopened.get(&cache_key(&request)).await?.unwrap();
    assert_eq!(cached.json()?, json!({"cached": true}));
    Ok(())
}
