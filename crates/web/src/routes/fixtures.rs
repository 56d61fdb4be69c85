use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use testdeck_common::{Fixture, FixturePatch, NewFixture, WithSteps};

use crate::auth::Principal;
use crate::error::{ApiJson, ApiResult};
use crate::server::AppState;

pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Vec<Fixture>>> {
    state.auth.authorize(&principal, "fixture.read")?;
    Ok(Json(state.db.list_fixtures(&project_id)?))
}

pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Path(project_id): Path<String>,
    ApiJson(body): ApiJson<NewFixture>,
) -> ApiResult<(StatusCode, Json<Fixture>)> {
    state.auth.authorize(&principal, "fixture.create")?;
    let fixture = state
        .db
        .create_fixture(&project_id, body, &principal.edit(None))?;
    Ok((StatusCode::CREATED, Json(fixture)))
}

pub async fn get(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<WithSteps<Fixture>>> {
    state.auth.authorize(&principal, "fixture.read")?;
    Ok(Json(state.db.get_fixture_with_steps(&id)?))
}

pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<FixturePatch>,
) -> ApiResult<Json<Fixture>> {
    state.auth.authorize(&principal, "fixture.update")?;
    Ok(Json(state.db.update_fixture(&id, patch, &principal.edit(None))?))
}

/// Refused with 409 while steps elsewhere still invoke the fixture.
pub async fn delete(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.auth.authorize(&principal, "fixture.delete")?;
    state.db.delete_fixture(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clone(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<WithSteps<Fixture>>)> {
    state.auth.authorize(&principal, "fixture.create")?;
    let copy = state.db.clone_fixture(&id, &principal.edit(None))?;
    Ok((StatusCode::CREATED, Json(copy)))
}
