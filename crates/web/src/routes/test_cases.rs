use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use testdeck_common::{NewTestCase, TestCase, TestCaseFilter, TestCasePatch, TestCaseStatus, WithSteps};

use crate::auth::Principal;
use crate::error::{ApiJson, ApiResult};
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListQuery {
    pub status: Option<TestCaseStatus>,
    pub tag: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    Path(project_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<TestCase>>> {
    state.auth.authorize(&principal, "testCase.read")?;
    let filter = TestCaseFilter {
        status: query.status,
        tag: query.tag,
    };
    Ok(Json(state.db.list_test_cases(&project_id, &filter)?))
}

pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Path(project_id): Path<String>,
    ApiJson(body): ApiJson<NewTestCase>,
) -> ApiResult<(StatusCode, Json<TestCase>)> {
    state.auth.authorize(&principal, "testCase.create")?;
    let case = state
        .db
        .create_test_case(&project_id, body, &principal.edit(None))?;
    Ok((StatusCode::CREATED, Json(case)))
}

pub async fn get(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<WithSteps<TestCase>>> {
    state.auth.authorize(&principal, "testCase.read")?;
    Ok(Json(state.db.get_test_case_with_steps(&id)?))
}

pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<TestCasePatch>,
) -> ApiResult<Json<TestCase>> {
    state.auth.authorize(&principal, "testCase.update")?;
    Ok(Json(state.db.update_test_case(&id, patch, &principal.edit(None))?))
}

pub async fn delete(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.auth.authorize(&principal, "testCase.delete")?;
    state.db.delete_test_case(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clone(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<WithSteps<TestCase>>)> {
    state.auth.authorize(&principal, "testCase.create")?;
    let copy = state.db.clone_test_case(&id, &principal.edit(None))?;
    Ok((StatusCode::CREATED, Json(copy)))
}
