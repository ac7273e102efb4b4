use serde_json::{json, Value};

use super::{CompletionRule, OperationSpec, SessionPlan};
use crate::request::Params;

fn session() -> SessionPlan {
    SessionPlan::new(
        "https://www.instagram.com/accounts/login/",
        "instagram.com",
        CompletionRule::CookiePresent("sessionid".to_string()),
    )
    .intercepting()
}

pub(super) fn operations() -> Vec<OperationSpec> {
    vec![
        OperationSpec::new("instagram:profile", "getInstagramProfile", profile)
            .session(session()),
        OperationSpec::new("instagram:likes", "getInstagramLikes", likes).session(session()),
        OperationSpec::new("instagram:comments", "getInstagramComments", comments)
            .session(session()),
        OperationSpec::new("instagram:saved_posts", "getInstagramSavedPosts", saved_posts)
            .session(session()),
    ]
}

fn profile(_: &Params) -> Value {
    json!({
        "username": "opacity.tester",
        "full_name": "Opacity Tester",
        "followers": 1280,
        "following": 312,
        "posts": 87,
        "is_private": false,
    })
}

fn likes(_: &Params) -> Value {
    json!({
        "likes": [
            { "media_id": "3301", "owner": "natgeo", "liked_at": "2024-02-10T12:00:00Z" },
            { "media_id": "3302", "owner": "nasa", "liked_at": "2024-02-11T09:30:00Z" },
        ]
    })
}

fn comments(_: &Params) -> Value {
    json!({
        "comments": [
            { "media_id": "3301", "text": "Stunning shot", "created_at": "2024-02-10T12:01:00Z" },
        ]
    })
}

fn saved_posts(_: &Params) -> Value {
    json!({
        "saved_posts": [
            { "media_id": "4410", "owner": "bonappetitmag", "saved_at": "2024-01-05T18:00:00Z" },
            { "media_id": "4411", "owner": "seriouseats", "saved_at": "2024-01-07T20:15:00Z" },
        ]
    })
}
