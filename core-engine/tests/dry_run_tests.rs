//! Integration tests for dry-run execution
//!
//! Dry-run requests never touch the network or the browser (except the
//! browser-only diagnostic) and return deterministic payloads.

mod common;

use bridge_traits::FixedClock;
use common::{dry_run_engine, offline_config, TestHost};
use core_engine::catalogue::{Execution, ParamKind, ProofPolicy};
use core_engine::{EngineError, ErrorCode};
use core_runtime::events::{CoreEvent, FlowEvent};
use core_runtime::EngineConfig;
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn fixed_clock_config() -> EngineConfig {
    EngineConfig {
        clock: Arc::new(FixedClock::at_unix(1_700_000_000)),
        ..offline_config()
    }
}

#[tokio::test]
async fn test_every_catalogued_operation_answers_with_valid_params() {
    let host = TestHost::new();
    let engine = dry_run_engine(&host, offline_config()).await;

    for spec in engine.catalogue().iter() {
        if spec.execution == Execution::BrowserOnly {
            continue;
        }
        let mut params = Map::new();
        for param in spec.params.iter().filter(|p| p.required) {
            let value = match param.kind {
                ParamKind::String => json!("2024-01-01"),
                ParamKind::Number => json!(45.5),
            };
            params.insert(param.name.to_string(), value);
        }
        let raw = Value::Object(params).to_string();

        let payload = engine
            .get(spec.name, Some(&raw))
            .await
            .unwrap_or_else(|e| panic!("{} failed: {}", spec.name, e));
        assert!(payload.value().is_ok(), "{} returned invalid JSON", spec.name);
        assert_eq!(
            payload.proof.is_some(),
            spec.proof == ProofPolicy::Attested,
            "{} proof presence",
            spec.name
        );
    }
}

#[tokio::test]
async fn test_alias_and_canonical_name_agree() {
    let host = TestHost::new();
    let engine = dry_run_engine(&host, fixed_clock_config()).await;

    let by_name = engine.get("github:profile", None).await.unwrap();
    let by_alias = engine.get("getGithubProfile", Some("{}")).await.unwrap();
    assert_eq!(by_name, by_alias);

    let proof: Value = serde_json::from_str(by_alias.proof.as_deref().unwrap()).unwrap();
    assert_eq!(proof["operation"], "github:profile");
    assert_eq!(proof["environment"], "sandbox");
}

#[tokio::test]
async fn test_fare_estimate_is_deterministic() {
    let host = TestHost::new();
    let engine = dry_run_engine(&host, fixed_clock_config()).await;
    let params = r#"{
        "pickup_latitude": 37.7749, "pickup_longitude": -122.4194,
        "destination_latitude": 37.8044, "destination_longitude": -122.2712
    }"#;

    let first = engine.get("getUberFareEstimate", Some(params)).await.unwrap();
    let second = engine.get("uber_rider:fare_estimate", Some(params)).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_param_errors() {
    let host = TestHost::new();
    let engine = dry_run_engine(&host, offline_config()).await;

    let missing = engine.get("uber_rider:trip", None).await.unwrap_err();
    assert_eq!(missing.code(), ErrorCode::InvalidParams);
    assert!(missing.to_string().contains("'id'"));

    let not_object = engine.get("uber_rider:trip", Some("[1, 2]")).await.unwrap_err();
    assert_eq!(not_object.code(), ErrorCode::InvalidParams);

    let bad_json = engine.get("reddit:account", Some("{oops")).await.unwrap_err();
    assert_eq!(bad_json.code(), ErrorCode::InvalidParams);

    let out_of_range = engine
        .get(
            "uber_rider:fare_estimate",
            Some(r#"{"pickup_latitude": 91, "pickup_longitude": 0, "destination_latitude": 0, "destination_longitude": 0}"#),
        )
        .await
        .unwrap_err();
    assert!(matches!(out_of_range, EngineError::InvalidParams(_)));
}

#[tokio::test]
async fn test_unknown_and_generic_names() {
    let host = TestHost::new();
    let engine = dry_run_engine(&host, offline_config()).await;

    let unknown = engine.get("getSomethingElse", None).await.unwrap_err();
    assert_eq!(unknown, EngineError::UnknownOperation("getSomethingElse".to_string()));

    let generic = engine
        .get("acme:balance", Some(r#"{"account": "a1"}"#))
        .await
        .unwrap();
    assert_eq!(
        generic.value().unwrap(),
        json!({"operation": "acme:balance", "params": {"account": "a1"}, "mock": true})
    );
    assert!(generic.proof.is_none());
}

#[tokio::test]
async fn test_flow_events_for_dry_run_requests() {
    let host = TestHost::new();
    let engine = dry_run_engine(&host, offline_config()).await;
    let mut events = engine.events().subscribe();

    engine.get("reddit:account", None).await.unwrap();
    engine.get("nope", None).await.unwrap_err();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Flow(flow) = event {
            seen.push(flow);
        }
    }

    assert!(matches!(&seen[0], FlowEvent::Started { operation, .. } if operation == "reddit:account"));
    assert!(matches!(&seen[1], FlowEvent::Completed { has_proof: true, .. }));
    assert!(matches!(&seen[2], FlowEvent::Started { .. }));
    assert!(matches!(&seen[3], FlowEvent::Failed { code, .. } if code == "UnknownOperation"));
}
