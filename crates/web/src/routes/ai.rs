use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use testdeck_common::{Error, Step, StepParent};

use crate::auth::Principal;
use crate::error::{ApiJson, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FixNameRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixNameResponse {
    pub original: String,
    pub name: String,
    pub provider: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AnalyzeRequest {
    /// One instruction or line of pasted code per entry
    #[serde(default)]
    pub lines: Vec<String>,
    /// A pasted block, split into lines
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

impl AnalyzeRequest {
    fn all_lines(&self) -> Vec<String> {
        let mut lines = self.lines.clone();
        if let Some(text) = &self.text {
            lines.extend(text.lines().map(str::to_string));
        }
        lines
    }
}

pub async fn fix_test_case_name(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(req): ApiJson<FixNameRequest>,
) -> ApiResult<Json<FixNameResponse>> {
    state.auth.authorize(&principal, "ai.use")?;
    let name = state.importer.fix_test_case_name(&req.name).await;
    Ok(Json(FixNameResponse {
        original: req.name,
        name,
        provider: state.importer.provider_kind().to_string(),
    }))
}

async fn analyze(
    state: &AppState,
    principal: &Principal,
    project_id: &str,
    parent: StepParent,
    req: AnalyzeRequest,
) -> ApiResult<(StatusCode, Json<Vec<Step>>)> {
    state.auth.authorize(principal, "ai.use")?;
    state.auth.authorize(principal, "step.create")?;

    let owner = match parent.kind {
        testdeck_common::ParentKind::TestCase => state.db.get_test_case(&parent.id)?.project_id,
        testdeck_common::ParentKind::Fixture => state.db.get_fixture(&parent.id)?.project_id,
    };
    if owner != project_id {
        return Err(Error::not_found(parent.kind.as_str(), &parent.id).into());
    }

    let steps = state
        .importer
        .import(
            &state.db,
            &parent,
            &req.all_lines(),
            &principal.edit(req.expected_version),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(steps)))
}

pub async fn analyze_fixture_steps(
    State(state): State<AppState>,
    principal: Principal,
    Path((project_id, fixture_id)): Path<(String, String)>,
    ApiJson(req): ApiJson<AnalyzeRequest>,
) -> ApiResult<(StatusCode, Json<Vec<Step>>)> {
    analyze(&state, &principal, &project_id, StepParent::fixture(fixture_id), req).await
}

pub async fn analyze_test_case_steps(
    State(state): State<AppState>,
    principal: Principal,
    Path((project_id, test_case_id)): Path<(String, String)>,
    ApiJson(req): ApiJson<AnalyzeRequest>,
) -> ApiResult<(StatusCode, Json<Vec<Step>>)> {
    analyze(&state, &principal, &project_id, StepParent::test_case(test_case_id), req).await
}
