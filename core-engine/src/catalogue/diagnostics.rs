//! Host integration checks.

use serde_json::{json, Value};

use super::{CompletionRule, Execution, OperationSpec, ProofPolicy, SessionPlan};
use crate::request::Params;

pub const OPEN_BROWSER_MUST_SUCCEED: &str = "test:open_browser_must_succeed";

pub(super) fn operations() -> Vec<OperationSpec> {
    vec![OperationSpec::new(
        OPEN_BROWSER_MUST_SUCCEED,
        "testOpenBrowserMustSucceed",
        opened,
    )
    .session(SessionPlan::new(
        "https://example.com/",
        "example.com",
        CompletionRule::AnyNavigation,
    ))
    .execution(Execution::BrowserOnly)
    .proof(ProofPolicy::None)]
}

fn opened(_: &Params) -> Value {
    json!({ "success": true })
}
