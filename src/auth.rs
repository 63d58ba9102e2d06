//! Request identity.

/// The authenticated principal behind a request.
///
/// Assigned to a context at most once by whatever authentication stage the
/// pipeline runs; many requests never get one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Principal {
    name: String,
    auth_type: Option<String>,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), auth_type: None }
    }

    /// A principal that records which scheme authenticated it
    /// (`"Basic"`, `"Bearer"`, …).
    pub fn with_auth_type(name: impl Into<String>, auth_type: impl Into<String>) -> Self {
        Self { name: name.into(), auth_type: Some(auth_type.into()) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn auth_type(&self) -> Option<&str> {
        self.auth_type.as_deref()
    }
}
