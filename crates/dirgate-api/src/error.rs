//! HTTP error responses
//!
//! Every failure leaves the API as `{"message", "status", "kind", "errors"}`
//! with the status mapped from the error kind.

use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dirgate_core::Error;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub status: u16,
    pub kind: &'static str,
    pub errors: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct ApiError(pub Error);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(Error::InvalidRequest(rejection.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn body(&self) -> ErrorBody {
        let mut errors = BTreeMap::new();
        if let Error::Validation { attribute } = &self.0 {
            errors.insert(attribute.clone(), "required".to_string());
        }

        ErrorBody {
            message: self.0.to_string(),
            status: self.status().as_u16(),
            kind: self.0.kind(),
            errors,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.0.kind(), error = %self.0, "Request failed");
        } else {
            warn!(kind = self.0.kind(), error = %self.0, "Request rejected");
        }

        let body = Json(self.body());
        if status == StatusCode::UNAUTHORIZED {
            (
                status,
                [(header::WWW_AUTHENTICATE, "Basic realm=Restricted")],
                body,
            )
                .into_response()
        } else {
            (status, body).into_response()
        }
    }
}
