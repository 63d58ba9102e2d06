//! Route-match result.

use std::collections::HashMap;

/// The outcome of routing a request: the sub-path the route matched and the
/// parameter bindings it captured.
///
/// Produced by an external router and attached to the context via
/// [`set_route`](crate::HttpContext::set_route); the context stores the
/// result but never computes matches itself.
#[derive(Clone, Debug, Default)]
pub struct RouteMatch {
    sub_path: String,
    params: HashMap<String, String>,
}

impl RouteMatch {
    pub fn new(sub_path: impl Into<String>, params: HashMap<String, String>) -> Self {
        Self { sub_path: sub_path.into(), params }
    }

    /// The sub-path below the matched route prefix. A request for
    /// `/users/42` matched under `/users` yields `/42`.
    pub fn sub_path(&self) -> &str {
        &self.sub_path
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `route.param("id")` on `/users/42`
    /// returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// All captured parameter bindings.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }
}
