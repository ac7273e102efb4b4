//! # Operation Catalogue
//!
//! Every named operation the engine knows: its canonical `namespace:operation`
//! name, legacy alias, parameter contract, interactive session plan, proof
//! policy and dry-run payload.
//!
//! Names not in the catalogue still resolve when they are syntactically valid
//! flow names; those run through the generic upstream endpoint.

mod carta;
mod diagnostics;
mod github;
mod gusto;
mod instagram;
mod reddit;
mod uber;
mod zabka;

pub use diagnostics::OPEN_BROWSER_MUST_SUCCEED;

use bridge_traits::BrowserCookies;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::request::{json_kind, Params};

/// Type a parameter must have when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }

    fn check(&self, params: &Params) -> Result<()> {
        let Some(value) = params.get(self.name) else {
            if self.required {
                return Err(EngineError::InvalidParams(format!(
                    "missing required param '{}'",
                    self.name
                )));
            }
            return Ok(());
        };

        match (self.kind, value) {
            (ParamKind::String, Value::String(s)) if self.required && s.trim().is_empty() => Err(
                EngineError::InvalidParams(format!("param '{}' must not be empty", self.name)),
            ),
            (ParamKind::String, Value::String(_)) => Ok(()),
            (ParamKind::Number, Value::Number(_)) => Ok(()),
            (kind, other) => Err(EngineError::InvalidParams(format!(
                "param '{}' must be {}, got {}",
                self.name,
                match kind {
                    ParamKind::String => "a string",
                    ParamKind::Number => "a number",
                },
                json_kind(other)
            ))),
        }
    }
}

/// When the interactive login counts as finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionRule {
    /// A navigation to a URL starting with this prefix.
    UrlPrefix(String),
    /// A navigation to a URL containing this fragment.
    UrlContains(String),
    /// Any navigation after which the named cookie is visible.
    CookiePresent(String),
    /// A navigation to any URL not starting with this prefix (usually the
    /// login page itself).
    NavigatedAway(String),
    /// The first navigation event.
    AnyNavigation,
}

impl CompletionRule {
    pub fn needs_cookies(&self) -> bool {
        matches!(self, CompletionRule::CookiePresent(_))
    }

    pub fn is_met(&self, url: &str, cookies: Option<&BrowserCookies>) -> bool {
        match self {
            CompletionRule::UrlPrefix(prefix) => url.starts_with(prefix.as_str()),
            CompletionRule::UrlContains(fragment) => url.contains(fragment.as_str()),
            CompletionRule::CookiePresent(name) => cookies.is_some_and(|c| c.contains(name)),
            CompletionRule::NavigatedAway(prefix) => !url.starts_with(prefix.as_str()),
            CompletionRule::AnyNavigation => true,
        }
    }
}

/// How to obtain a logged-in browser session for an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlan {
    pub login_url: String,
    pub cookie_domain: String,
    pub completion: CompletionRule,
    pub intercept_requests: bool,
    pub user_agent: Option<String>,
}

impl SessionPlan {
    pub fn new(
        login_url: impl Into<String>,
        cookie_domain: impl Into<String>,
        completion: CompletionRule,
    ) -> Self {
        Self {
            login_url: login_url.into(),
            cookie_domain: cookie_domain.into(),
            completion,
            intercept_requests: false,
            user_agent: None,
        }
    }

    pub fn intercepting(mut self) -> Self {
        self.intercept_requests = true;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Whether results of an operation carry a proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProofPolicy {
    None,
    #[default]
    Attested,
}

/// Where the data comes from in live mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// The upstream flow endpoint, with the captured session when the
    /// operation has a session plan.
    #[default]
    Upstream,
    /// The browser flow itself; no upstream call in either mode.
    BrowserOnly,
}

pub type ParamCheck = fn(&Params) -> Result<()>;
pub type MockPayload = fn(&Params) -> Value;

/// One catalogued operation.
#[derive(Debug, Clone)]
pub struct OperationSpec {
    pub name: &'static str,
    pub alias: &'static str,
    pub params: Vec<ParamSpec>,
    pub session: Option<SessionPlan>,
    pub proof: ProofPolicy,
    pub execution: Execution,
    check: Option<ParamCheck>,
    mock: MockPayload,
}

impl OperationSpec {
    pub fn new(name: &'static str, alias: &'static str, mock: MockPayload) -> Self {
        Self {
            name,
            alias,
            params: Vec::new(),
            session: None,
            proof: ProofPolicy::default(),
            execution: Execution::default(),
            check: None,
            mock,
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn session(mut self, plan: SessionPlan) -> Self {
        self.session = Some(plan);
        self
    }

    pub fn proof(mut self, policy: ProofPolicy) -> Self {
        self.proof = policy;
        self
    }

    pub fn execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    /// Extra validation after the per-parameter type checks.
    pub fn check(mut self, check: ParamCheck) -> Self {
        self.check = Some(check);
        self
    }

    pub fn namespace(&self) -> &'static str {
        namespace_of(self.name)
    }

    pub fn validate(&self, params: &Params) -> Result<()> {
        for spec in &self.params {
            spec.check(params)?;
        }
        match self.check {
            Some(check) => check(params),
            None => Ok(()),
        }
    }

    /// Deterministic dry-run payload.
    pub fn mock_payload(&self, params: &Params) -> Value {
        (self.mock)(params)
    }
}

/// What a request name resolved to.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Catalogued(&'a OperationSpec),
    Generic(&'a str),
}

impl<'a> Target<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Target::Catalogued(spec) => spec.name,
            Target::Generic(name) => name,
        }
    }

    pub fn namespace(&self) -> &'a str {
        namespace_of(self.name())
    }
}

/// Lookup table over all catalogued operations.
#[derive(Debug, Clone)]
pub struct Catalogue {
    operations: Vec<OperationSpec>,
    index: HashMap<&'static str, usize>,
}

impl Catalogue {
    /// Every built-in operation.
    pub fn standard() -> Self {
        let operations = [
            uber::operations(),
            reddit::operations(),
            instagram::operations(),
            zabka::operations(),
            carta::operations(),
            github::operations(),
            gusto::operations(),
            diagnostics::operations(),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::from_operations(operations)
    }

    pub fn from_operations(operations: Vec<OperationSpec>) -> Self {
        let mut index = HashMap::with_capacity(operations.len() * 2);
        for (position, spec) in operations.iter().enumerate() {
            index.insert(spec.name, position);
            if !spec.alias.is_empty() {
                index.insert(spec.alias, position);
            }
        }
        Self { operations, index }
    }

    /// Resolve a canonical name or alias, falling back to a generic flow for
    /// well-formed `namespace:operation` names.
    pub fn resolve<'a>(&'a self, name: &'a str) -> Result<Target<'a>> {
        if let Some(&position) = self.index.get(name) {
            return Ok(Target::Catalogued(&self.operations[position]));
        }
        if is_flow_name(name) {
            return Ok(Target::Generic(name));
        }
        Err(EngineError::UnknownOperation(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&OperationSpec> {
        self.index.get(name).map(|&position| &self.operations[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationSpec> {
        self.operations.iter()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::standard()
    }
}

/// `namespace:operation`, both halves non-empty `[a-z0-9_]`.
pub fn is_flow_name(name: &str) -> bool {
    let valid = |part: &str| {
        !part.is_empty()
            && part
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
    };
    match name.split_once(':') {
        Some((namespace, operation)) => valid(namespace) && valid(operation),
        None => false,
    }
}

fn namespace_of(name: &str) -> &str {
    name.split_once(':').map_or(name, |(namespace, _)| namespace)
}

/// Dry-run payload for operations outside the catalogue.
pub fn generic_mock_payload(name: &str, params: &Params) -> Value {
    json!({
        "operation": name,
        "params": params.to_value(),
        "mock": true,
    })
}
