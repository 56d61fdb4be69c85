use axum::{
    extract::{Path, Query, State},
    Json,
};
use testdeck_common::{StepParent, Version};

use super::ExpectedVersion;
use crate::auth::Principal;
use crate::error::ApiResult;
use crate::server::AppState;

fn list_for(state: &AppState, principal: &Principal, parent: StepParent, permission: &str) -> ApiResult<Json<Vec<Version>>> {
    state.auth.authorize(principal, permission)?;
    Ok(Json(state.db.list_versions(&parent)?))
}

fn revert(
    state: &AppState,
    principal: &Principal,
    parent: StepParent,
    version_id: &str,
    expected_version: Option<i64>,
    permission: &str,
) -> ApiResult<Json<Version>> {
    state.auth.authorize(principal, permission)?;
    let version = state
        .db
        .revert(&parent, version_id, &principal.edit(expected_version))?;
    Ok(Json(version))
}

/// Newest first
pub async fn list_for_test_case(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Version>>> {
    list_for(&state, &principal, StepParent::test_case(id), "testCase.read")
}

pub async fn list_for_fixture(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Version>>> {
    list_for(&state, &principal, StepParent::fixture(id), "fixture.read")
}

pub async fn get(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<Version>> {
    state.auth.authorize(&principal, "project.read")?;
    Ok(Json(state.db.get_version(&id)?))
}

/// Returns the new version recording the restored state.
pub async fn revert_test_case(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, version_id)): Path<(String, String)>,
    Query(query): Query<ExpectedVersion>,
) -> ApiResult<Json<Version>> {
    revert(
        &state,
        &principal,
        StepParent::test_case(id),
        &version_id,
        query.expected_version,
        "testCase.update",
    )
}

pub async fn revert_fixture(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, version_id)): Path<(String, String)>,
    Query(query): Query<ExpectedVersion>,
) -> ApiResult<Json<Version>> {
    revert(
        &state,
        &principal,
        StepParent::fixture(id),
        &version_id,
        query.expected_version,
        "fixture.update",
    )
}
