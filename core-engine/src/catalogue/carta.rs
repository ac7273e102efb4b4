use serde_json::{json, Value};

use super::{CompletionRule, OperationSpec, ParamKind, ParamSpec, SessionPlan};
use crate::request::Params;

fn session() -> SessionPlan {
    SessionPlan::new(
        "https://login.app.carta.com/credentials/login/",
        "carta.com",
        CompletionRule::UrlPrefix("https://app.carta.com/".to_string()),
    )
}

pub(super) fn operations() -> Vec<OperationSpec> {
    vec![
        OperationSpec::new("carta:profile", "getCartaProfile", profile).session(session()),
        OperationSpec::new("carta:organizations", "getCartaOrganizations", organizations)
            .session(session()),
        OperationSpec::new(
            "carta:portfolio_investments",
            "getCartaPortfolioInvestments",
            portfolio_investments,
        )
        .param(ParamSpec::required("firm_id", ParamKind::String))
        .param(ParamSpec::required("account_id", ParamKind::String))
        .session(session()),
        OperationSpec::new(
            "carta:holdings_companies",
            "getCartaHoldingsCompanies",
            holdings_companies,
        )
        .param(ParamSpec::required("account_id", ParamKind::String))
        .session(session()),
        OperationSpec::new(
            "carta:corporation_securities",
            "getCartaCorporationSecurities",
            corporation_securities,
        )
        .param(ParamSpec::required("account_id", ParamKind::String))
        .param(ParamSpec::required("corporation_id", ParamKind::String))
        .session(session()),
    ]
}

fn profile(_: &Params) -> Value {
    json!({
        "id": 90210,
        "full_name": "Morgan Holder",
        "email": "morgan.holder@example.com",
        "is_investor": true,
    })
}

fn organizations(_: &Params) -> Value {
    json!({
        "organizations": [
            { "id": 1001, "name": "Acme Ventures", "type": "firm" },
            { "id": 2002, "name": "Widget Labs, Inc.", "type": "corporation" },
        ]
    })
}

fn portfolio_investments(params: &Params) -> Value {
    json!({
        "firm_id": params.str("firm_id").unwrap_or_default(),
        "account_id": params.str("account_id").unwrap_or_default(),
        "investments": [
            { "company": "Widget Labs, Inc.", "invested": 250000.0, "currency": "USD", "round": "Series A" },
            { "company": "Gizmo Corp", "invested": 100000.0, "currency": "USD", "round": "Seed" },
        ],
    })
}

fn holdings_companies(params: &Params) -> Value {
    json!({
        "account_id": params.str("account_id").unwrap_or_default(),
        "companies": [
            { "corporation_id": "2002", "name": "Widget Labs, Inc.", "share_count": 120000 },
        ],
    })
}

fn corporation_securities(params: &Params) -> Value {
    json!({
        "account_id": params.str("account_id").unwrap_or_default(),
        "corporation_id": params.str("corporation_id").unwrap_or_default(),
        "securities": [
            { "label": "CS-12", "kind": "common", "quantity": 100000, "issued_at": "2021-02-01" },
            { "label": "ES-4", "kind": "option", "quantity": 20000, "strike_price": 0.42, "issued_at": "2022-07-15" },
        ],
    })
}
