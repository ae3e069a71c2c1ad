use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::core::aliases::DieselError;

pub const SUCCESS: &str = "SUCCESS";
pub const FAILED: &str = "FAILED";

/// Response envelope shared by every endpoint: `{status, data, msg}`.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct StdResponse<T, M> {
    pub status: String,
    pub data: Option<T>,
    pub msg: Option<M>,
}

impl<T, M> StdResponse<T, M> {
    pub fn success(data: T, msg: M) -> Self {
        Self {
            status: SUCCESS.to_owned(),
            data: Some(data),
            msg: Some(msg),
        }
    }

    /// Success envelope whose data may legitimately be absent, e.g. a user
    /// without an address or cart.
    pub fn success_opt(data: Option<T>, msg: M) -> Self {
        Self {
            status: SUCCESS.to_owned(),
            data,
            msg: Some(msg),
        }
    }

    pub fn failure(msg: M) -> Self {
        Self {
            status: FAILED.to_owned(),
            data: None,
            msg: Some(msg),
        }
    }
}

impl<T: Serialize, M: Serialize> IntoResponse for StdResponse<T, M> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    ForbiddenResource(String),
    #[error("{0}")]
    UnprocessableEntity(String),
    #[error("{0} is unreachable")]
    ServiceUnreachable(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<DieselError> for AppError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => AppError::NotFound("Resource not found".to_owned()),
            other => AppError::Other(other.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::ForbiddenResource(_) => StatusCode::FORBIDDEN,
            AppError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ServiceUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal failures are logged with their full chain and surfaced as
        // the generic message only.
        let msg = match &self {
            AppError::Other(err) => {
                tracing::error!(error = ?err, "Request failed");
                "Server Error".to_owned()
            }
            other => other.to_string(),
        };

        (status, Json(StdResponse::<serde_json::Value, String>::failure(msg))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let res = StdResponse::success(vec![1, 2, 3], "Get orders successfully");
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["status"], "SUCCESS");
        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
        assert_eq!(json["msg"], "Get orders successfully");
    }

    #[test]
    fn empty_success_envelope_serializes_null_data() {
        let res = StdResponse::<i32, &str>::success_opt(None, "Get address successfully");
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["status"], "SUCCESS");
        assert!(json["data"].is_null());
    }

    #[test]
    fn failure_envelope_shape() {
        let res = StdResponse::<i32, &str>::failure("No Order found");
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert!(json["data"].is_null());
        assert_eq!(json["msg"], "No Order found");
    }

    #[test]
    fn error_status_codes() {
        let cases = [
            (
                AppError::NotFound("No Order found".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::BadRequest("Order Creation is failed".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Unauthorized("Invalid bearer token".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::ForbiddenResource("Admin privileges are required".into()),
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::UnprocessableEntity("products is required".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::ServiceUnreachable("ShopMart API".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::Other(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let response = AppError::Other(anyhow::anyhow!("connection refused")).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["msg"], "Server Error");
    }

    #[test]
    fn diesel_not_found_maps_to_not_found() {
        let err: AppError = DieselError::NotFound.into();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
