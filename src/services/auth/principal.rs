use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::services::auth::failure::AuthFailure;

/// Resolved identity of an authenticated request.
///
/// - `subject` is the token `sub`, as known by the identity store
/// - `roles` come from the identity store at request time, never from token claims
/// - `claims` are the custom claims carried by the token (opaque to the gate)
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    subject: String,
    roles: BTreeSet<String>,
    claims: Map<String, Value>,
}

impl Principal {
    pub fn new(subject: impl Into<String>, roles: BTreeSet<String>) -> Self {
        Self {
            subject: subject.into(),
            roles,
            claims: Map::new(),
        }
    }

    pub fn with_claims(mut self, claims: Map<String, Value>) -> Self {
        self.claims = claims;
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Explicit capability check for handlers.
///
/// Succeeds only when the principal holds every role in `required`.
pub fn require_roles(principal: &Principal, required: &[&str]) -> Result<(), AuthFailure> {
    if required.iter().all(|role| principal.has_role(role)) {
        Ok(())
    } else {
        Err(AuthFailure::InsufficientRole)
    }
}
