//! Integration tests for interactive browser flows
//!
//! Uses the browser-only diagnostic operation so no upstream is involved:
//! - Completion through a navigation event
//! - Timeout, cancellation and user close all dismiss the browser
//! - Concurrent flows are bounded by the browser lease limit
//! - Webview events with nowhere to go are dropped

mod common;

use common::{dry_run_engine, offline_config, on_present, TestHost};
use core_engine::catalogue::OPEN_BROWSER_MUST_SUCCEED;
use core_engine::{CancellationToken, EngineError};
use core_runtime::events::{CoreEvent, FlowEvent, WebviewEvent};
use core_runtime::EngineConfig;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn short_timeout() -> EngineConfig {
    EngineConfig {
        interactive_timeout: Duration::from_millis(200),
        ..offline_config()
    }
}

#[tokio::test]
async fn test_open_browser_succeeds_on_first_navigation() {
    let host = TestHost::new();
    let engine = dry_run_engine(&host, offline_config()).await;
    let _driver = on_present(&host, &engine, |presented| {
        assert_eq!(presented.url, "https://example.com/");
        presented.navigate(1, "https://example.com/landing");
    });

    let payload = engine.get(OPEN_BROWSER_MUST_SUCCEED, None).await.unwrap();

    assert_eq!(payload.value().unwrap(), json!({"success": true}));
    assert!(payload.proof.is_none());
    assert!(host.browser.presented_flows().is_empty());
}

#[tokio::test]
async fn test_timeout_closes_browser() {
    let host = TestHost::new();
    let engine = dry_run_engine(&host, short_timeout()).await;
    let mut events = engine.events().subscribe();

    let err = engine
        .get("testOpenBrowserMustSucceed", None)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        EngineError::Timeout {
            after: Duration::from_millis(200)
        }
    );
    assert!(host.browser.presented_flows().is_empty());

    let mut timed_out = None;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Flow(FlowEvent::TimedOut { flow_id, .. }) = event {
            timed_out = Some(flow_id);
        }
    }
    assert!(matches!(timed_out, Some(Some(_))));
}

#[tokio::test]
async fn test_cancellation_closes_browser() {
    let host = TestHost::new();
    let engine = dry_run_engine(&host, offline_config()).await;
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    let _driver = on_present(&host, &engine, move |_| trigger.cancel());

    let err = engine
        .get_with_cancellation(OPEN_BROWSER_MUST_SUCCEED, None, cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Cancelled(_)));
    assert!(host.browser.presented_flows().is_empty());
}

#[tokio::test]
async fn test_user_closing_browser_cancels_request() {
    let host = TestHost::new();
    let engine = dry_run_engine(&host, offline_config()).await;
    let _driver = on_present(&host, &engine, |presented| presented.close());

    let err = engine.get(OPEN_BROWSER_MUST_SUCCEED, None).await.unwrap_err();

    assert_eq!(
        err,
        EngineError::Cancelled("browser closed by user".to_string())
    );
    assert!(host.browser.presented_flows().is_empty());
}

#[tokio::test]
async fn test_window_close_event_cancels_request() {
    let host = TestHost::new();
    let engine = dry_run_engine(&host, offline_config()).await;
    let _driver = on_present(&host, &engine, |presented| {
        presented.engine.emit_webview_event(
            &json!({"event": "window.close", "id": "1", "flow_id": presented.flow.to_string()})
                .to_string(),
        );
    });

    let err = engine.get(OPEN_BROWSER_MUST_SUCCEED, None).await.unwrap_err();
    assert!(matches!(err, EngineError::Cancelled(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_browser_leases_serialize_flows_at_limit_one() {
    let host = TestHost::new();
    let config = EngineConfig {
        max_concurrent_browsers: 1,
        ..offline_config()
    };
    let engine = dry_run_engine(&host, config).await;

    let flows = Arc::new(Mutex::new(Vec::new()));
    let max_open = Arc::new(AtomicUsize::new(0));
    let _driver = {
        let flows = Arc::clone(&flows);
        let max_open = Arc::clone(&max_open);
        on_present(&host, &engine, move |presented| {
            let open = presented.browser.presented_flows().len();
            max_open.fetch_max(open, Ordering::SeqCst);
            flows.lock().unwrap().push(presented.flow);
            presented.navigate(1, "https://example.com/done");
        })
    };

    let (a, b) = tokio::join!(
        engine.get(OPEN_BROWSER_MUST_SUCCEED, None),
        engine.get("testOpenBrowserMustSucceed", None)
    );
    a.unwrap();
    b.unwrap();

    let flows = flows.lock().unwrap();
    assert_eq!(flows.len(), 2);
    assert_ne!(flows[0], flows[1]);
    assert_eq!(max_open.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_events_for_other_flows_do_not_complete_a_flow() {
    let host = TestHost::new();
    let engine = dry_run_engine(&host, short_timeout()).await;
    let _driver = on_present(&host, &engine, |presented| {
        presented.engine.emit_webview_event(&common::navigation(
            Some(bridge_traits::FlowId::new()),
            1,
            "https://example.com/elsewhere",
            None,
        ));
    });

    let err = engine.get(OPEN_BROWSER_MUST_SUCCEED, None).await.unwrap_err();
    assert!(matches!(err, EngineError::Timeout { .. }));
}

#[tokio::test]
async fn test_undeliverable_webview_events_are_dropped() {
    let host = TestHost::new();
    let engine = dry_run_engine(&host, offline_config()).await;
    let mut events = engine.events().subscribe();

    engine.emit_webview_event("{not json");
    engine.emit_webview_event(&common::navigation(None, 7, "https://example.com/", None));

    let mut dropped = Vec::new();
    while let Ok(CoreEvent::Webview(WebviewEvent::Dropped { reason })) = events.try_recv() {
        dropped.push(reason);
    }
    assert_eq!(dropped.len(), 2);
    assert!(dropped[0].starts_with("malformed webview event"));
    assert!(dropped[1].contains("navigation"));
}
