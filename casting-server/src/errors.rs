use crate::catalog::CatalogError;
use auth_gate::Denial;
use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;
use log::warn;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub message: String,
    pub status_code: StatusCode,
    /// Machine readable reason, only set for authorization failures
    pub code: Option<&'static str>,
}

impl ApiError {
    /// Create a new ApiError with a message and status code
    pub fn new<S: ToString>(message: S, status_code: StatusCode) -> Self {
        Self {
            message: message.to_string(),
            status_code,
            code: None,
        }
    }

    /// Create new Not Found Error (404)
    pub fn not_found() -> Self {
        Self::new("Not found", StatusCode::NOT_FOUND)
    }

    /// Create new Bad Request Error (400)
    pub fn bad_request() -> Self {
        Self::new("bad request", StatusCode::BAD_REQUEST)
    }

    /// Create new Method Not Allowed Error (405)
    pub fn method_not_allowed() -> Self {
        Self::new("method not allowed", StatusCode::METHOD_NOT_ALLOWED)
    }

    /// Create new Unprocessable Entity Error (422)
    pub fn unprocessable() -> Self {
        Self::new("unprocessable", StatusCode::UNPROCESSABLE_ENTITY)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let mut body = json!({
            "success": false,
            "error": self.status_code.as_u16(),
            "message": self.message,
        });
        if let Some(code) = self.code {
            body["code"] = json!(code);
        }
        (self.status_code, Json(body)).into_response()
    }
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        Self {
            status_code: denial.status(),
            code: Some(denial.error_code),
            message: denial.message,
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        warn!("{}", err);
        match err {
            CatalogError::NotFound(..) => Self::not_found(),
            CatalogError::InvalidRecord(..) => Self::unprocessable(),
            CatalogError::InvalidUpdate(..) => Self::bad_request(),
        }
    }
}
