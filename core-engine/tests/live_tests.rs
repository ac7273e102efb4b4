//! Integration tests for live requests against a mocked upstream
//!
//! - Handshake outcome decides the lifecycle
//! - Interactive login, session caching and one re-login on rejection
//! - `session_required` hints for operations outside the catalogue
//! - Upstream failures leave an error page up only when asked to
//! - Parallel logins each send only their own browser's cookies

mod common;

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{BrowserCookies, FlowId, HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use common::{offline_config, on_present, TestHost, API_KEY};
use core_engine::{EngineError, EngineState, Environment, InitError, RequestEngine};
use core_runtime::EngineConfig;
use mockall::{mock, Sequence};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

mock! {
    Upstream {}

    #[async_trait]
    impl HttpClient for Upstream {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

fn body(request: &HttpRequest) -> Value {
    serde_json::from_slice(request.body.as_deref().unwrap_or_default()).unwrap_or(Value::Null)
}

fn is_flow(request: &HttpRequest, name: &str) -> bool {
    request.url.ends_with(&format!("/api/v1/flows/{}", name))
}

fn accept_handshake(mock: &mut MockUpstream) {
    mock.expect_execute()
        .withf(|request| request.url.ends_with("/api/v1/sdk/handshake"))
        .times(1)
        .returning(|_| Ok(HttpResponse::new(200, "{}")));
}

async fn live_engine(host: &TestHost, mock: MockUpstream, show_errors: bool) -> RequestEngine {
    let config = EngineConfig {
        http_client: Some(Arc::new(mock) as Arc<dyn HttpClient>),
        retry_policy: RetryPolicy::none(),
        ..offline_config()
    };
    let engine = host.engine(config);
    engine
        .init(API_KEY, false, Environment::Sandbox, show_errors)
        .await
        .expect("live init");
    engine
}

#[tokio::test]
async fn test_rejected_key_fails_init_for_good() {
    let host = TestHost::new();
    let mut mock = MockUpstream::new();
    mock.expect_execute().times(1).returning(|_| {
        Ok(HttpResponse::new(
            401,
            r#"{"code":"InvalidApiKey","description":"unknown key"}"#,
        ))
    });
    let engine = host.engine(EngineConfig {
        http_client: Some(Arc::new(mock) as Arc<dyn HttpClient>),
        ..offline_config()
    });

    let err = engine
        .init(API_KEY, false, Environment::Production, false)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        InitError::InvalidApiKey("InvalidApiKey: unknown key".to_string())
    );
    assert!(matches!(engine.state(), EngineState::Failed(_)));
    assert!(matches!(
        engine.get("github:profile", None).await,
        Err(EngineError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_login_once_then_reuse_cached_session() {
    let host = TestHost::new();
    let mut mock = MockUpstream::new();
    accept_handshake(&mut mock);
    mock.expect_execute()
        .withf(|request| {
            is_flow(request, "github:profile") && body(request)["session"]["user_session"] == "abc"
        })
        .times(2)
        .returning(|_| {
            Ok(HttpResponse::new(
                200,
                json!({"data": {"login": "octocat"}, "proof": "upstream-proof"}).to_string(),
            ))
        });
    let engine = live_engine(&host, mock, false).await;

    let presentations = Arc::new(AtomicUsize::new(0));
    let _driver = {
        let presentations = Arc::clone(&presentations);
        on_present(&host, &engine, move |presented| {
            presentations.fetch_add(1, Ordering::SeqCst);
            presented
                .browser
                .set_cookies(
                    presented.flow,
                    "github.com",
                    BrowserCookies::new().with("user_session", "abc"),
                )
                .unwrap();
            presented.navigate(1, "https://github.com/");
        })
    };

    let first = engine.get("getGithubProfile", None).await.unwrap();
    assert_eq!(first.value().unwrap(), json!({"login": "octocat"}));
    assert_eq!(first.proof.as_deref(), Some("upstream-proof"));
    assert!(host.browser.presented_flows().is_empty());

    let second = engine.get("github:profile", None).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(presentations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rejected_cached_session_triggers_one_relogin() {
    let host = TestHost::new();
    let mut mock = MockUpstream::new();
    let mut seq = Sequence::new();
    accept_handshake(&mut mock);
    let session_is = |value: &'static str| {
        move |request: &HttpRequest| {
            is_flow(request, "reddit:account") && body(request)["session"]["reddit_session"] == value
        }
    };
    mock.expect_execute()
        .withf(session_is("first"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(HttpResponse::new(200, r#"{"data":{"name":"u1"}}"#)));
    mock.expect_execute()
        .withf(session_is("first"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(HttpResponse::new(401, r#"{"code":"SessionExpired","description":"log in"}"#)));
    mock.expect_execute()
        .withf(session_is("second"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(HttpResponse::new(200, r#"{"data":{"name":"u1"}}"#)));
    let engine = live_engine(&host, mock, false).await;

    let presentations = Arc::new(AtomicUsize::new(0));
    let _driver = {
        let presentations = Arc::clone(&presentations);
        on_present(&host, &engine, move |presented| {
            let n = presentations.fetch_add(1, Ordering::SeqCst);
            let value = if n == 0 { "first" } else { "second" };
            presented.navigate_with_cookies(
                1,
                "https://www.reddit.com/",
                json!({ "reddit_session": value }),
            );
        })
    };

    engine.get("reddit:account", None).await.unwrap();
    let payload = engine.get("getRedditAccount", None).await.unwrap();

    assert_eq!(payload.value().unwrap(), json!({"name": "u1"}));
    assert_eq!(presentations.load(Ordering::SeqCst), 2);

    // Attested locally since upstream sent no proof.
    let proof: Value = serde_json::from_str(payload.proof.as_deref().unwrap()).unwrap();
    assert_eq!(proof["operation"], "reddit:account");
    assert_eq!(proof["key_fingerprint"].as_str().unwrap().len(), 16);
}

#[tokio::test]
async fn test_session_required_hint_drives_generic_login() {
    let host = TestHost::new();
    let mut mock = MockUpstream::new();
    let mut seq = Sequence::new();
    accept_handshake(&mut mock);
    mock.expect_execute()
        .withf(|request| is_flow(request, "acme:balance") && body(request).get("session").is_none())
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| {
            Ok(HttpResponse::new(
                200,
                json!({"session_required": {"login_url": "https://acme.test/login"}}).to_string(),
            ))
        });
    mock.expect_execute()
        .withf(|request| is_flow(request, "acme:balance") && body(request)["session"]["sid"] == "s1")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(HttpResponse::new(200, r#"{"data":{"balance":10}}"#)));
    let engine = live_engine(&host, mock, false).await;

    let login_url = Arc::new(Mutex::new(String::new()));
    let _driver = {
        let login_url = Arc::clone(&login_url);
        on_present(&host, &engine, move |presented| {
            *login_url.lock().unwrap() = presented.url.clone();
            presented.navigate(1, "https://acme.test/login?step=2");
            presented.navigate_with_cookies(2, "https://acme.test/home", json!({"sid": "s1"}));
        })
    };

    let payload = engine
        .get("acme:balance", Some(r#"{"account":"a1"}"#))
        .await
        .unwrap();

    assert_eq!(payload.value().unwrap(), json!({"balance": 10}));
    assert!(payload.proof.is_none());
    assert_eq!(*login_url.lock().unwrap(), "https://acme.test/login");
}

fn failing_github_upstream() -> MockUpstream {
    let mut mock = MockUpstream::new();
    accept_handshake(&mut mock);
    mock.expect_execute()
        .withf(|request| is_flow(request, "github:profile"))
        .times(1)
        .returning(|_| Ok(HttpResponse::new(500, "boom")));
    mock
}

fn log_in_to_github(host: &TestHost, engine: &RequestEngine) -> Arc<Mutex<Option<FlowId>>> {
    let flow = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&flow);
    on_present(host, engine, move |presented| {
        *seen.lock().unwrap() = Some(presented.flow);
        presented.navigate_with_cookies(1, "https://github.com/", json!({"user_session": "abc"}));
    });
    flow
}

#[tokio::test]
async fn test_upstream_failure_shows_error_page_when_enabled() {
    let host = TestHost::new();
    let engine = live_engine(&host, failing_github_upstream(), true).await;
    let flow = log_in_to_github(&host, &engine);

    let err = engine.get("github:profile", None).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::UpstreamFailure {
            status: Some(500),
            detail: "boom".to_string()
        }
    );

    let flow = flow.lock().unwrap().expect("browser was presented");
    let session = host.browser.session(flow).expect("browser left open");
    assert!(session
        .current_url
        .starts_with("https://sandbox.opacity.network/sdk/error?code=UpstreamFailure"));
}

#[tokio::test]
async fn test_upstream_failure_closes_browser_by_default() {
    let host = TestHost::new();
    let engine = live_engine(&host, failing_github_upstream(), false).await;
    let flow = log_in_to_github(&host, &engine);

    let err = engine.get("github:profile", None).await.unwrap_err();
    assert!(matches!(err, EngineError::UpstreamFailure { status: Some(500), .. }));

    let flow = flow.lock().unwrap().expect("browser was presented");
    assert!(host.browser.session(flow).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_parallel_logins_keep_their_own_cookies() {
    let host = TestHost::new();
    let mut mock = MockUpstream::new();
    accept_handshake(&mut mock);
    mock.expect_execute()
        .withf(|request| is_flow(request, "github:profile"))
        .times(2)
        .returning(|request| {
            let login = body(&request)["session"]["user_session"].clone();
            Ok(HttpResponse::new(200, json!({"data": {"login": login}}).to_string()))
        });
    let engine = host.engine(EngineConfig {
        http_client: Some(Arc::new(mock) as Arc<dyn HttpClient>),
        retry_policy: RetryPolicy::none(),
        max_concurrent_browsers: 2,
        session_cache: false,
        ..offline_config()
    });
    engine
        .init(API_KEY, false, Environment::Sandbox, false)
        .await
        .expect("live init");

    // Nobody logs in until both browsers are on screen.
    let shown = Arc::new(Mutex::new(Vec::<FlowId>::new()));
    let max_open = Arc::new(AtomicUsize::new(0));
    let _driver = {
        let shown = Arc::clone(&shown);
        let max_open = Arc::clone(&max_open);
        on_present(&host, &engine, move |presented| {
            max_open.fetch_max(presented.browser.presented_flows().len(), Ordering::SeqCst);
            let mut shown = shown.lock().unwrap();
            shown.push(presented.flow);
            if shown.len() < 2 {
                return;
            }
            for flow in shown.iter() {
                presented
                    .browser
                    .set_cookies(
                        *flow,
                        "github.com",
                        BrowserCookies::new().with("user_session", format!("session-{}", flow)),
                    )
                    .unwrap();
            }
            for flow in shown.iter() {
                presented.engine.emit_webview_event(&common::navigation(
                    Some(*flow),
                    1,
                    "https://github.com/",
                    None,
                ));
            }
        })
    };

    let (a, b) = tokio::join!(
        engine.get("github:profile", None),
        engine.get("getGithubProfile", None)
    );
    let logins: Vec<String> = [a.unwrap(), b.unwrap()]
        .iter()
        .map(|payload| payload.value().unwrap()["login"].as_str().unwrap().to_string())
        .collect();

    let shown = shown.lock().unwrap();
    assert_eq!(max_open.load(Ordering::SeqCst), 2);
    assert_eq!(shown.len(), 2);
    assert_ne!(logins[0], logins[1]);
    let mut expected: Vec<String> = shown.iter().map(|flow| format!("session-{}", flow)).collect();
    let mut logins = logins;
    expected.sort();
    logins.sort();
    assert_eq!(logins, expected);
    assert!(host.browser.presented_flows().is_empty());
}
