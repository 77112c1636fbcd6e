//! Locating the binding tuple in an incoming request.

use std::collections::HashMap;

use serde_json::Value;

use crate::manifest::BindingTuple;

/// The parts of a request the gate looks at.
#[derive(Debug, Clone, Default)]
pub struct GateRequest {
    pub body: Option<Value>,
    pub query: HashMap<String, String>,
}

impl GateRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// Find the requested binding: `body.binding`, then the body itself, then
/// the query string. The first structurally valid candidate wins.
pub fn resolve_binding(request: &GateRequest) -> Option<BindingTuple> {
    let body = request.body.as_ref();
    body.and_then(|b| b.get("binding"))
        .and_then(BindingTuple::from_value)
        .or_else(|| body.and_then(BindingTuple::from_value))
        .or_else(|| from_query(&request.query))
}

fn from_query(query: &HashMap<String, String>) -> Option<BindingTuple> {
    let field = |name: &str| {
        query
            .get(name)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    };
    Some(BindingTuple {
        avatar: field("avatar")?,
        vessel: field("vessel")?,
        capsule: field("capsule")?,
        gate: field("gate")?,
    })
}
