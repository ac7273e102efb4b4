use serde_json::{json, Value};

use super::{CompletionRule, OperationSpec, SessionPlan};
use crate::request::Params;

// The loyalty app authenticates against its own API; the session is taken
// from the intercepted token exchange rather than from cookies alone.
fn session() -> SessionPlan {
    SessionPlan::new(
        "https://www.zabka.pl/app/login",
        "zabka.pl",
        CompletionRule::UrlContains("/app/account".to_string()),
    )
    .intercepting()
}

pub(super) fn operations() -> Vec<OperationSpec> {
    vec![
        OperationSpec::new("zabka:account", "getZabkaAccount", account).session(session()),
        OperationSpec::new("zabka:points", "getZabkaPoints", points).session(session()),
    ]
}

fn account(_: &Params) -> Value {
    json!({
        "id": "zb-000042",
        "first_name": "Jan",
        "phone_number": "+48555000111",
        "registered_at": "2021-09-14",
    })
}

fn points(_: &Params) -> Value {
    json!({
        "balance": 1275,
        "currency": "zappsy",
        "expiring": { "amount": 150, "at": "2024-12-31" },
    })
}
