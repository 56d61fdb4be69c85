//! Request authentication for Axum handlers.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Serialize;
use testdeck_common::EditContext;

use super::session::SessionClaims;
use crate::error::ApiError;
use crate::server::AppState;

/// The authenticated caller of a request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl Principal {
    /// Identity used for every request when auth is disabled
    pub fn local_admin() -> Self {
        Self {
            user_id: "local".to_string(),
            email: "local@localhost".to_string(),
            roles: vec!["admin".to_string()],
        }
    }

    /// Edit context attributing writes to this caller
    pub fn edit(&self, expected_version: Option<i64>) -> EditContext {
        EditContext::by(self.user_id.clone()).expecting(expected_version)
    }
}

impl From<SessionClaims> for Principal {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            roles: claims.roles,
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        state.auth.authenticate(header)
    }
}
