//! `/api` route table

mod ai;
mod auth;
mod fixtures;
mod projects;
mod runs;
mod steps;
mod test_cases;
mod versions;

use axum::{
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;

use crate::server::AppState;

/// `?expectedVersion=N` on endpoints without a request body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExpectedVersion {
    pub expected_version: Option<i64>,
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Sessions
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/whoami", get(auth::whoami))
        // Projects
        .route("/api/projects", get(projects::list).post(projects::create))
        .route(
            "/api/projects/:id",
            get(projects::get).put(projects::update).delete(projects::delete),
        )
        .route("/api/projects/:id/tags", get(projects::tags).post(projects::add_tags))
        // Test cases
        .route(
            "/api/projects/:id/test-cases",
            get(test_cases::list).post(test_cases::create),
        )
        .route(
            "/api/test-cases/:id",
            get(test_cases::get).put(test_cases::update).delete(test_cases::delete),
        )
        .route("/api/test-cases/:id/clone", post(test_cases::clone))
        .route(
            "/api/test-cases/:id/steps",
            get(steps::list_for_test_case).post(steps::insert_into_test_case),
        )
        .route("/api/test-cases/:id/steps/reorder", put(steps::reorder_test_case))
        .route("/api/test-cases/:id/versions", get(versions::list_for_test_case))
        .route(
            "/api/test-cases/:id/versions/:vid/revert",
            post(versions::revert_test_case),
        )
        // Fixtures
        .route(
            "/api/projects/:id/fixtures",
            get(fixtures::list).post(fixtures::create),
        )
        .route(
            "/api/fixtures/:id",
            get(fixtures::get).put(fixtures::update).delete(fixtures::delete),
        )
        .route("/api/fixtures/:id/clone", post(fixtures::clone))
        .route(
            "/api/fixtures/:id/steps",
            get(steps::list_for_fixture).post(steps::insert_into_fixture),
        )
        .route("/api/fixtures/:id/steps/reorder", put(steps::reorder_fixture))
        .route("/api/fixtures/:id/versions", get(versions::list_for_fixture))
        .route(
            "/api/fixtures/:id/versions/:vid/revert",
            post(versions::revert_fixture),
        )
        // Steps
        .route("/api/steps/:id", put(steps::update).delete(steps::delete))
        .route("/api/steps/:id/move", put(steps::move_to))
        .route("/api/steps/:id/move-up", post(steps::move_up))
        .route("/api/steps/:id/move-down", post(steps::move_down))
        .route("/api/steps/duplicate/:id", post(steps::duplicate))
        // Versions
        .route("/api/versions/:id", get(versions::get))
        // Runs
        .route("/api/projects/:id/runs", post(runs::start))
        .route("/api/projects/:id/test-results", get(runs::list))
        .route("/api/test-results/:id", get(runs::get).delete(runs::delete))
        // AI
        .route("/api/ai/fix-test-case-name", post(ai::fix_test_case_name))
        .route(
            "/api/projects/:id/fixtures/:fid/steps/analyze",
            post(ai::analyze_fixture_steps),
        )
        .route(
            "/api/projects/:id/test-cases/:tid/steps/analyze",
            post(ai::analyze_test_case_steps),
        )
}
