//! End-to-end resolution against mock HTTP servers.

use serde_json::json;
use startgate_core::BootstrapPayload;
use startgate_core::DeviceInfo;
use startgate_core::GateError;
use startgate_core::GateResolver;
use startgate_core::GateTimeouts;
use startgate_core::HttpConfigStore;
use startgate_core::MemoryStateStore;
use startgate_core::PushTokenWaiter;
use startgate_core::StateStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_string_contains;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;

fn test_timeouts() -> GateTimeouts {
    GateTimeouts {
        push_token_wait: Duration::from_millis(50),
        redirect: Duration::from_millis(500),
        probe: Duration::from_millis(500),
        post_fallback: Duration::from_millis(500),
    }
}

/// Resolver wired to `server` for both the config store and the gate
/// endpoint, with a push token already delivered so payload building never
/// waits.
fn resolver_for(
    server: &MockServer,
    state: Arc<MemoryStateStore>,
) -> anyhow::Result<GateResolver> {
    let config_store = Arc::new(HttpConfigStore::new(Url::parse(&server.uri())?));
    let waiter = Arc::new(PushTokenWaiter::new());
    waiter.handle().deliver("test-push-token".to_string());

    let device = DeviceInfo {
        os_version: "17.2".to_string(),
        model: "phone".to_string(),
        bundle_id: "com.example.app".to_string(),
    };
    let resolver =
        GateResolver::with_timeouts(config_store, state, waiter, device, test_timeouts())?;
    resolver.configure_session("session-1", Some("att-1".to_string()));
    Ok(resolver)
}

async fn mount_config(server: &MockServer, swap: &str) {
    Mock::given(method("GET"))
        .and(path("/config.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stray": server.uri(),
            "swap": swap,
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn resolves_through_redirect_chain() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_config(&server, "gate").await;

    // Seeding the device id slot makes the payload fully deterministic,
    // so the gate mock can demand the exact encoded `data` parameter.
    let state = Arc::new(MemoryStateStore::new());
    state.set(startgate_core::DEVICE_ID_KEY, "dev-fixed");
    let expected_data = BootstrapPayload {
        device_id: "dev-fixed".to_string(),
        session_id: "session-1".to_string(),
        push_token: "test-push-token".to_string(),
        os_version: "17.2".to_string(),
        device_model: "phone".to_string(),
        bundle_id: "com.example.app".to_string(),
        att_token: "att-1".to_string(),
    }
    .encode();

    // The split destination reassembles to {server}/start.
    Mock::given(method("GET"))
        .and(path("/gate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bat": format!("{}/sta", server.uri()),
            "man": "rt/",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/final"))
        .mount(&server)
        .await;
    // Plain body: the probe finds no JSON and must keep the redirect result.
    Mock::given(method("GET"))
        .and(path("/final"))
        .respond_with(ResponseTemplate::new(200).set_body_string("landing page"))
        .mount(&server)
        .await;

    let resolver = resolver_for(&server, state.clone())?;
    let resolved = resolver.resolve().await?;

    assert_eq!(format!("{}/final", server.uri()), resolved.to_string());
    // The cache slot holds the final choice.
    assert_eq!(
        Some(format!("{}/final", server.uri())),
        state.get(startgate_core::FINAL_URL_KEY)
    );

    // The gate request carried the base64 payload as its raw `data` query.
    let requests = server.received_requests().await.unwrap_or_default();
    let gate_query = requests
        .iter()
        .find(|request| request.url.path() == "/gate")
        .and_then(|request| request.url.query().map(str::to_string));
    assert_eq!(Some(format!("data={expected_data}")), gate_query);
    Ok(())
}

#[tokio::test]
async fn probe_refines_destination_when_no_redirects() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_config(&server, "gate").await;

    Mock::given(method("GET"))
        .and(path("/gate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bat": format!("{}/landi", server.uri()),
            "man": "ng",
        })))
        .mount(&server)
        .await;
    // No redirect; the destination itself serves a fragment refinement.
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bat": format!("{}/refi", server.uri()),
            "man": "ned",
        })))
        .mount(&server)
        .await;

    let resolver = resolver_for(&server, Arc::new(MemoryStateStore::new()))?;
    let resolved = resolver.resolve().await?;

    assert_eq!(format!("{}/refined", server.uri()), resolved.to_string());
    Ok(())
}

#[tokio::test]
async fn single_fragment_response_is_invalid_config() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_config(&server, "gate").await;

    Mock::given(method("GET"))
        .and(path("/gate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "only": "one-value",
            "count": 2,
        })))
        .mount(&server)
        .await;

    let resolver = resolver_for(&server, Arc::new(MemoryStateStore::new()))?;
    let result = resolver.resolve().await;
    assert!(matches!(result, Err(GateError::InvalidConfig)));
    Ok(())
}

#[tokio::test]
async fn non_success_gate_status_is_invalid_config() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_config(&server, "gate").await;

    Mock::given(method("GET"))
        .and(path("/gate"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let resolver = resolver_for(&server, Arc::new(MemoryStateStore::new()))?;
    let result = resolver.resolve().await;
    assert!(matches!(result, Err(GateError::InvalidConfig)));
    Ok(())
}

#[tokio::test]
async fn config_read_failure_is_no_data() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let resolver = resolver_for(&server, Arc::new(MemoryStateStore::new()))?;
    let result = resolver.resolve().await;
    assert!(matches!(result, Err(GateError::NoData)));
    Ok(())
}

#[tokio::test]
async fn config_missing_field_is_invalid_config() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stray": "host-only.example",
        })))
        .mount(&server)
        .await;

    let resolver = resolver_for(&server, Arc::new(MemoryStateStore::new()))?;
    let result = resolver.resolve().await;
    assert!(matches!(result, Err(GateError::InvalidConfig)));
    Ok(())
}

#[tokio::test]
async fn overall_deadline_surfaces_timeout() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "stray": "x", "swap": "y" }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let resolver = resolver_for(&server, Arc::new(MemoryStateStore::new()))?;
    let result = resolver
        .resolve_with_timeout(Duration::from_millis(100))
        .await;
    assert!(matches!(result, Err(GateError::Timeout)));
    Ok(())
}

#[tokio::test]
async fn post_fallback_resolves_and_cancels_fuse() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fallback"))
        .and(header(
            "Content-Type",
            "application/x-www-form-urlencoded; charset=utf-8",
        ))
        .and(body_string_contains("data="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bat": format!("{}/po", server.uri()),
            "man": "st",
        })))
        .mount(&server)
        .await;

    let resolver = resolver_for(&server, Arc::new(MemoryStateStore::new()))?;
    let fuse = CancellationToken::new();
    let base = Url::parse(&format!("{}/fallback", server.uri()))?;
    let resolved = resolver.try_post_fallback(base, fuse.clone()).await?;

    assert_eq!(format!("{}/post", server.uri()), resolved.to_string());
    assert!(fuse.is_cancelled());
    Ok(())
}

#[tokio::test]
async fn post_fallback_failure_still_cancels_fuse() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fallback"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let resolver = resolver_for(&server, Arc::new(MemoryStateStore::new()))?;
    let fuse = CancellationToken::new();
    let base = Url::parse(&format!("{}/fallback", server.uri()))?;
    let result = resolver.try_post_fallback(base, fuse.clone()).await;

    assert!(matches!(result, Err(GateError::InvalidConfig)));
    assert!(fuse.is_cancelled());
    Ok(())
}

#[tokio::test]
async fn http_fallback_runs_redirects_and_probe() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/candidate"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/settled"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/settled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .mount(&server)
        .await;

    let resolver = resolver_for(&server, Arc::new(MemoryStateStore::new()))?;
    let resolved = resolver
        .try_http_fallback(&format!("{}/candidate", server.uri()))
        .await?;
    assert_eq!(format!("{}/settled", server.uri()), resolved.to_string());
    Ok(())
}

#[tokio::test]
async fn http_fallback_rejects_unparsable_candidate() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let resolver = resolver_for(&server, Arc::new(MemoryStateStore::new()))?;
    let result = resolver.try_http_fallback("not a url").await;
    assert!(matches!(result, Err(GateError::InvalidConfig)));
    Ok(())
}
