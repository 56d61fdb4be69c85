use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use testdeck_common::{NewProject, Project, ProjectPatch};

use crate::auth::Principal;
use crate::error::{ApiJson, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddTags {
    pub tags: Vec<String>,
}

pub async fn list(State(state): State<AppState>, principal: Principal) -> ApiResult<Json<Vec<Project>>> {
    state.auth.authorize(&principal, "project.read")?;
    Ok(Json(state.db.list_projects()?))
}

pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(body): ApiJson<NewProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    state.auth.authorize(&principal, "project.create")?;
    Ok((StatusCode::CREATED, Json(state.db.create_project(body)?)))
}

pub async fn get(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<Project>> {
    state.auth.authorize(&principal, "project.read")?;
    Ok(Json(state.db.get_project(&id)?))
}

pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ProjectPatch>,
) -> ApiResult<Json<Project>> {
    state.auth.authorize(&principal, "project.update")?;
    Ok(Json(state.db.update_project(&id, patch)?))
}

pub async fn delete(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.auth.authorize(&principal, "project.delete")?;
    state.db.delete_project(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn tags(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<String>>> {
    state.auth.authorize(&principal, "project.read")?;
    Ok(Json(state.db.list_project_tags(&id)?))
}

pub async fn add_tags(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AddTags>,
) -> ApiResult<Json<Vec<String>>> {
    state.auth.authorize(&principal, "project.update")?;
    Ok(Json(state.db.add_project_tags(&id, &body.tags)?))
}
