use serde_json::{json, Value};

use super::{CompletionRule, OperationSpec, SessionPlan};
use crate::request::Params;

fn session() -> SessionPlan {
    SessionPlan::new(
        "https://app.gusto.com/login",
        "gusto.com",
        CompletionRule::UrlContains("/dashboard".to_string()),
    )
}

pub(super) fn operations() -> Vec<OperationSpec> {
    vec![
        OperationSpec::new("gusto:members_table", "getGustoMembersTable", members_table)
            .session(session()),
        OperationSpec::new("gusto:payroll_admin_id", "getGustoPayrollAdminId", payroll_admin_id)
            .session(session()),
    ]
}

fn members_table(_: &Params) -> Value {
    json!({
        "columns": ["name", "title", "department", "start_date"],
        "rows": [
            ["Riley Chen", "Engineer", "Platform", "2022-01-10"],
            ["Jordan Patel", "Designer", "Product", "2023-03-06"],
        ],
    })
}

fn payroll_admin_id(_: &Params) -> Value {
    json!({ "payroll_admin_id": "7757616923" })
}
