//! HTTP error mapping

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use testdeck_common::Error;
use testdeck_runner::RunnerError;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("access denied")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] Error),
}

impl From<RunnerError> for ApiError {
    fn from(err: RunnerError) -> Self {
        ApiError::Store(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(err) => match err {
                Error::Validation(_) => StatusCode::BAD_REQUEST,
                Error::NotFound { .. } => StatusCode::NOT_FOUND,
                Error::AlreadyExists { .. }
                | Error::Conflict(_)
                | Error::InvalidStateTransition { .. } => StatusCode::CONFLICT,
                Error::PermissionDenied(_) => StatusCode::FORBIDDEN,
                Error::Runner(_) | Error::Ai(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Message safe to show to callers. Dependency and internal failures
    /// are reduced to a generic text.
    fn public_message(&self) -> String {
        match self {
            ApiError::Store(Error::PermissionDenied(_)) => "access denied".to_string(),
            ApiError::Store(err) if err.is_client_error() => err.to_string(),
            ApiError::Store(Error::Runner(_)) => "test runner failed".to_string(),
            ApiError::Store(Error::Ai(_)) => "AI provider failed".to_string(),
            ApiError::Store(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// JSON body extractor whose rejections use the API error shape
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Error::validation("bad"), StatusCode::BAD_REQUEST; "validation")]
    #[test_case(Error::not_found("step", "s1"), StatusCode::NOT_FOUND; "not found")]
    #[test_case(Error::Conflict("stale".into()), StatusCode::CONFLICT; "conflict")]
    #[test_case(Error::InvalidStateTransition { from: "failed".into(), to: "running".into() }, StatusCode::CONFLICT; "state")]
    #[test_case(Error::PermissionDenied("x".into()), StatusCode::FORBIDDEN; "denied")]
    #[test_case(Error::Runner("spawn".into()), StatusCode::BAD_GATEWAY; "runner")]
    #[test_case(Error::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR; "internal")]
    fn test_status_mapping(err: Error, expected: StatusCode) {
        assert_eq!(ApiError::from(err).status(), expected);
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::from(Error::Integrity("snapshot orders 0,2".into()));
        assert_eq!(err.public_message(), "internal server error");

        let err = ApiError::from(Error::PermissionDenied("testCase.delete on tc-1".into()));
        assert_eq!(err.public_message(), "access denied");
    }
}
