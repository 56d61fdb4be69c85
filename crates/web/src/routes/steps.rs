//! Step ordering endpoints. Every structural write records a version of
//! the owning test case or fixture and honours `expectedVersion`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use testdeck_common::{NewStep, Step, StepParent, StepPatch};

use super::ExpectedVersion;
use crate::auth::Principal;
use crate::error::{ApiJson, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InsertStep {
    pub action: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub fixture_ref: Option<String>,
    #[serde(default)]
    pub playwright_script: Option<String>,
    /// Appended when absent; clamped to the list bounds
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

impl InsertStep {
    fn into_parts(self) -> (NewStep, Option<i64>, Option<i64>) {
        let step = NewStep {
            action: self.action,
            data: self.data,
            expected: self.expected,
            disabled: self.disabled,
            fixture_ref: self.fixture_ref,
            playwright_script: self.playwright_script,
        };
        (step, self.position, self.expected_version)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MoveStep {
    pub position: i64,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReorderSteps {
    pub step_ids: Vec<String>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

fn list_for(state: &AppState, principal: &Principal, parent: StepParent) -> ApiResult<Json<Vec<Step>>> {
    state.auth.authorize(principal, "step.read")?;
    Ok(Json(state.db.list_steps(&parent)?))
}

fn insert_into(
    state: &AppState,
    principal: &Principal,
    parent: StepParent,
    body: InsertStep,
) -> ApiResult<(StatusCode, Json<Step>)> {
    state.auth.authorize(principal, "step.create")?;
    let (step, position, expected_version) = body.into_parts();
    let created = state
        .db
        .insert_step(&parent, step, position, &principal.edit(expected_version))?;
    Ok((StatusCode::CREATED, Json(created)))
}

fn reorder(
    state: &AppState,
    principal: &Principal,
    parent: StepParent,
    body: ReorderSteps,
) -> ApiResult<Json<Vec<Step>>> {
    state.auth.authorize(principal, "step.update")?;
    let steps = state.db.reorder_steps(
        &parent,
        &body.step_ids,
        &principal.edit(body.expected_version),
    )?;
    Ok(Json(steps))
}

pub async fn list_for_test_case(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Step>>> {
    list_for(&state, &principal, StepParent::test_case(id))
}

pub async fn list_for_fixture(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Step>>> {
    list_for(&state, &principal, StepParent::fixture(id))
}

pub async fn insert_into_test_case(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<InsertStep>,
) -> ApiResult<(StatusCode, Json<Step>)> {
    insert_into(&state, &principal, StepParent::test_case(id), body)
}

pub async fn insert_into_fixture(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<InsertStep>,
) -> ApiResult<(StatusCode, Json<Step>)> {
    insert_into(&state, &principal, StepParent::fixture(id), body)
}

pub async fn reorder_test_case(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ReorderSteps>,
) -> ApiResult<Json<Vec<Step>>> {
    reorder(&state, &principal, StepParent::test_case(id), body)
}

pub async fn reorder_fixture(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ReorderSteps>,
) -> ApiResult<Json<Vec<Step>>> {
    reorder(&state, &principal, StepParent::fixture(id), body)
}

pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<StepPatch>,
) -> ApiResult<Json<Step>> {
    state.auth.authorize(&principal, "step.update")?;
    Ok(Json(state.db.update_step(&id, patch, &principal.edit(None))?))
}

/// Returns the remaining steps of the parent.
pub async fn delete(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Query(query): Query<ExpectedVersion>,
) -> ApiResult<Json<Vec<Step>>> {
    state.auth.authorize(&principal, "step.delete")?;
    let parent = state.db.get_step(&id)?.parent();
    let steps = state
        .db
        .delete_step(&parent, &id, &principal.edit(query.expected_version))?;
    Ok(Json(steps))
}

pub async fn move_to(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<MoveStep>,
) -> ApiResult<Json<Vec<Step>>> {
    state.auth.authorize(&principal, "step.update")?;
    let parent = state.db.get_step(&id)?.parent();
    let steps = state.db.move_step(
        &parent,
        &id,
        body.position,
        &principal.edit(body.expected_version),
    )?;
    Ok(Json(steps))
}

pub async fn move_up(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Query(query): Query<ExpectedVersion>,
) -> ApiResult<Json<Vec<Step>>> {
    state.auth.authorize(&principal, "step.update")?;
    let steps = state
        .db
        .move_step_up(&id, &principal.edit(query.expected_version))?;
    Ok(Json(steps))
}

pub async fn move_down(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Query(query): Query<ExpectedVersion>,
) -> ApiResult<Json<Vec<Step>>> {
    state.auth.authorize(&principal, "step.update")?;
    let steps = state
        .db
        .move_step_down(&id, &principal.edit(query.expected_version))?;
    Ok(Json(steps))
}

/// The copy lands directly after the original.
pub async fn duplicate(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Query(query): Query<ExpectedVersion>,
) -> ApiResult<(StatusCode, Json<Step>)> {
    state.auth.authorize(&principal, "step.create")?;
    let copy = state
        .db
        .duplicate_step(&id, &principal.edit(query.expected_version))?;
    Ok((StatusCode::CREATED, Json(copy)))
}
