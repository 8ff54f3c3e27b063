use crate::openapi::HEALTH_TAG;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::warn;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

/// Basic health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct Health {
    status: &'static str,
    details: Option<Value>,
    #[serde(skip)]
    status_code: StatusCode,
}

impl IntoResponse for Health {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "status": self.status
        });

        if let Some(Value::Object(obj)) = self.details {
            for (key, value) in obj {
                body[key] = value;
            }
        }

        (self.status_code, Json(body)).into_response()
    }
}

/// Unguarded landing route
#[utoipa::path(
    get,
    path = "/",
    tag = HEALTH_TAG,
    responses(
        (status = 200, description = "Service name and version")
    )
)]
pub(crate) async fn index() -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Liveness check handler
#[utoipa::path(
    get,
    path = "/health",
    tag = HEALTH_TAG,
    responses(
        (status = 200, description = "Service is alive", body = Health)
    )
)]
pub(crate) async fn health_check() -> impl IntoResponse {
    Health {
        status: "ok",
        details: None,
        status_code: StatusCode::OK,
    }
}

/// Readiness check handler
#[utoipa::path(
    get,
    path = "/ready",
    tag = HEALTH_TAG,
    responses(
        (status = 200, description = "Signing keys are loaded", body = Health),
        (status = 503, description = "Identity provider unreachable", body = Health)
    )
)]
pub(crate) async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.health_check().await {
        Health {
            status: "ok",
            details: Some(serde_json::json!({
                "jwks_status": "healthy"
            })),
            status_code: StatusCode::OK,
        }
    } else {
        warn!(
            "Readiness check failed, no signing keys from {}",
            state.config.auth.jwks_url
        );
        Health {
            status: "error",
            details: Some(serde_json::json!({
                "error": "Signing keys could not be loaded"
            })),
            status_code: StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::TestFixture;
    use http::StatusCode;
    use serde_json::json;
    use wiremock::ResponseTemplate;

    #[tokio::test]
    async fn test_index_needs_no_token() {
        let fixture = TestFixture::with_jwks_response(ResponseTemplate::new(503)).await;
        let response = fixture.get_anonymous("/").await;
        response.assert_ok();
        assert_eq!(response.json["success"], true);
        assert_eq!(response.json["service"], env!("CARGO_PKG_NAME"));

        let requests = fixture.jwks_mock.received_requests().await.unwrap_or_default();
        assert!(requests.is_empty());
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let fixture = TestFixture::with_jwks_response(ResponseTemplate::new(503)).await;
        let response = fixture.get_anonymous("/health").await;
        response.assert_ok();
        assert_eq!(response.json, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_ready_endpoint() {
        let fixture = TestFixture::new().await;
        let response = fixture.get_anonymous("/ready").await;
        response.assert_ok();
        assert_eq!(
            response.json,
            json!({"status": "ok", "jwks_status": "healthy"})
        );
    }

    #[tokio::test]
    async fn test_ready_endpoint_without_identity_provider() {
        let fixture = TestFixture::with_jwks_response(ResponseTemplate::new(503)).await;
        let response = fixture.get_anonymous("/ready").await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.json,
            json!({"status": "error", "error": "Signing keys could not be loaded"})
        );

        // Guarded routes report the outage as an authentication failure
        let token = fixture.token(&["get:actors"]);
        let response = fixture.get("/actors", &token).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json["code"], "key_source_unavailable");
        assert_eq!(response.json["message"], "Authorization server unreachable.");
    }
}
