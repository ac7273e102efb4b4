use serde_json::{json, Value};

use super::{CompletionRule, OperationSpec, SessionPlan};
use crate::request::Params;

fn session() -> SessionPlan {
    SessionPlan::new(
        "https://www.reddit.com/login/",
        "reddit.com",
        CompletionRule::CookiePresent("reddit_session".to_string()),
    )
}

pub(super) fn operations() -> Vec<OperationSpec> {
    vec![
        OperationSpec::new("reddit:account", "getRedditAccount", account).session(session()),
        OperationSpec::new(
            "reddit:followed_subreddits",
            "getRedditFollowedSubreddits",
            followed_subreddits,
        )
        .session(session()),
        OperationSpec::new("reddit:comments", "getRedditComments", comments).session(session()),
        OperationSpec::new("reddit:posts", "getRedditPosts", posts).session(session()),
    ]
}

fn account(_: &Params) -> Value {
    json!({
        "name": "opacity_tester",
        "id": "t2_1a2b3c",
        "created_utc": 1546300800,
        "link_karma": 1204,
        "comment_karma": 5310,
        "has_verified_email": true,
    })
}

fn followed_subreddits(_: &Params) -> Value {
    json!({
        "subreddits": [
            { "name": "rust", "subscribers": 312000 },
            { "name": "privacy", "subscribers": 1500000 },
            { "name": "cryptography", "subscribers": 98000 },
        ]
    })
}

fn comments(_: &Params) -> Value {
    json!({
        "comments": [
            { "id": "kq1", "subreddit": "rust", "body": "Borrow checker says no.", "score": 42 },
            { "id": "kq2", "subreddit": "privacy", "body": "Use a password manager.", "score": 17 },
        ]
    })
}

fn posts(_: &Params) -> Value {
    json!({
        "posts": [
            { "id": "1abc", "subreddit": "rust", "title": "Async traits in practice", "score": 256, "num_comments": 48 },
        ]
    })
}
