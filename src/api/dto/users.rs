use serde::Serialize;
use serde_json::{Map, Value};

use crate::services::auth::principal::Principal;

#[derive(Debug, Clone, Serialize)]
pub struct PrincipalResponse {
    pub subject: String,
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub claims: Map<String, Value>,
}

impl From<&Principal> for PrincipalResponse {
    fn from(p: &Principal) -> Self {
        Self {
            subject: p.subject().to_string(),
            roles: p.roles().iter().cloned().collect(),
            claims: p.claims().clone(),
        }
    }
}
