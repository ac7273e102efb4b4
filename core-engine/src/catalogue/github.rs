use serde_json::{json, Value};

use super::{CompletionRule, OperationSpec, SessionPlan};
use crate::request::Params;

pub(super) fn operations() -> Vec<OperationSpec> {
    vec![
        OperationSpec::new("github:profile", "getGithubProfile", profile).session(SessionPlan::new(
            "https://github.com/login",
            "github.com",
            CompletionRule::CookiePresent("user_session".to_string()),
        )),
    ]
}

fn profile(_: &Params) -> Value {
    json!({
        "login": "opacity-tester",
        "id": 5550101,
        "name": "Opacity Tester",
        "public_repos": 23,
        "followers": 61,
        "following": 12,
        "created_at": "2016-05-20T10:00:00Z",
    })
}
