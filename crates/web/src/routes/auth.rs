use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use testdeck_common::User;
use tracing::{info, warn};

use crate::auth::Principal;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    /// Unix seconds
    pub expires_at: i64,
    pub user: User,
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let Some(user) = state.db.verify_password(&req.email, &req.password)? else {
        warn!("Failed login for {}", req.email.trim());
        return Err(ApiError::Unauthenticated);
    };

    let (token, claims) = state
        .auth
        .keys()
        .issue(&user)
        .map_err(|e| testdeck_common::Error::Internal(format!("failed to sign session: {}", e)))?;
    info!("User {} logged in", user.email);

    Ok(Json(LoginResponse {
        token,
        expires_at: claims.exp,
        user,
    }))
}

pub async fn whoami(principal: Principal) -> Json<Principal> {
    Json(principal)
}
