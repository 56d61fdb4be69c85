use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use testdeck_common::TestResult;
use testdeck_runner::{RunRequest, RunStarted};
use tracing::info;

use crate::auth::Principal;
use crate::error::{ApiJson, ApiResult};
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// Background runs answer 202 with `{testResultId}`; `mode: "wait"`
/// answers with the finished result.
pub async fn start(
    State(state): State<AppState>,
    principal: Principal,
    Path(project_id): Path<String>,
    ApiJson(request): ApiJson<RunRequest>,
) -> ApiResult<Response> {
    state.auth.authorize(&principal, "testResult.create")?;
    info!("{} starting a run for project {}", principal.email, project_id);

    let response = match state.orchestrator.start(&project_id, request).await? {
        RunStarted::Background { test_result_id } => (
            StatusCode::ACCEPTED,
            Json(json!({ "testResultId": test_result_id })),
        )
            .into_response(),
        RunStarted::Finished(result) => (StatusCode::OK, Json(result)).into_response(),
    };
    Ok(response)
}

/// Newest first
pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    Path(project_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<TestResult>>> {
    state.auth.authorize(&principal, "testResult.read")?;
    Ok(Json(state.db.list_test_results(&project_id, query.limit)?))
}

pub async fn get(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<TestResult>> {
    state.auth.authorize(&principal, "testResult.read")?;
    Ok(Json(state.db.get_test_result(&id)?))
}

pub async fn delete(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.auth.authorize(&principal, "testResult.delete")?;
    state.db.delete_test_result(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
