use crate::config::ServerConfig;
use crate::create_app;
use crate::state::AppState;
use auth_gate::testing;
use axum::body::Body;
use axum::Router;
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde::Serialize;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test fixture for driving the application end to end against a mocked
/// identity provider.
///
/// The mock serves the JWKS document at `/.well-known/jwks.json`; tokens are
/// minted with the fixed test keys from `auth_gate::testing`.
///
/// # Examples
///
/// ```rust
/// #[tokio::test]
/// async fn test_endpoint() {
///     let fixture = TestFixture::new().await;
///     let token = fixture.token(&["get:actors"]);
///
///     let response = fixture.get("/actors", &token).await;
///     response.assert_ok();
/// }
/// ```
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// Configuration pointing at the mock identity provider
    pub config: ServerConfig,
    /// Mock server publishing the signing keys
    pub jwks_mock: MockServer,
}

impl TestFixture {
    /// Creates a fixture whose identity provider publishes the primary test key.
    pub async fn new() -> Self {
        Self::with_jwks_response(
            ResponseTemplate::new(200).set_body_json(testing::jwks(&[&testing::PRIMARY])),
        )
        .await
    }

    /// Creates a fixture whose JWKS endpoint answers with `response`.
    pub async fn with_jwks_response(response: ResponseTemplate) -> Self {
        let _ = env_logger::builder()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();

        let jwks_mock = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/.well-known/jwks.json"))
            .respond_with(response)
            .mount(&jwks_mock)
            .await;

        let config = ServerConfig::for_test_with_mocks(&jwks_mock);
        let state = AppState::new(config.clone()).expect("Failed to create app state");
        let app = create_app(state).await;

        Self {
            app,
            config,
            jwks_mock,
        }
    }

    /// Mints a valid token signed by the primary key carrying `permissions`.
    pub fn token(&self, permissions: &[&str]) -> String {
        testing::PRIMARY.sign(&testing::claims(permissions))
    }

    /// Creates a request builder with a JSON content type and, if given, a
    /// bearer token.
    pub fn request_builder(
        &self,
        method: Method,
        uri: impl AsRef<str>,
        token: Option<&str>,
    ) -> http::request::Builder {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri.as_ref())
            .header("Content-Type", "application/json");

        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder
    }

    pub async fn get(&self, uri: impl AsRef<str>, token: &str) -> TestResponse {
        let request = self
            .request_builder(Method::GET, uri, Some(token))
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Sends a GET request without an `Authorization` header.
    pub async fn get_anonymous(&self, uri: impl AsRef<str>) -> TestResponse {
        let request = self
            .request_builder(Method::GET, uri, None)
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    pub async fn post<T: Serialize>(
        &self,
        uri: impl AsRef<str>,
        body: &T,
        token: &str,
    ) -> TestResponse {
        self.send_json(Method::POST, uri, body, Some(token)).await
    }

    pub async fn patch<T: Serialize>(
        &self,
        uri: impl AsRef<str>,
        body: &T,
        token: &str,
    ) -> TestResponse {
        self.send_json(Method::PATCH, uri, body, Some(token)).await
    }

    pub async fn delete(&self, uri: impl AsRef<str>, token: &str) -> TestResponse {
        let request = self
            .request_builder(Method::DELETE, uri, Some(token))
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Sends a request with a JSON body using any method.
    pub async fn send_json<T: Serialize>(
        &self,
        method: Method,
        uri: impl AsRef<str>,
        body: &T,
        token: Option<&str>,
    ) -> TestResponse {
        let json_body = serde_json::to_vec(body).expect("Failed to serialize body to JSON");
        let request = self
            .request_builder(method, uri, token)
            .body(Body::from(json_body))
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Sends a request through the router and collects the response.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        // Try to parse as JSON, defaulting to empty object if parsing fails or empty body
        let json = if !body.is_empty() {
            serde_json::from_slice(&body).unwrap_or_else(|_| serde_json::json!({}))
        } else {
            serde_json::json!({})
        };

        TestResponse {
            status,
            headers,
            json,
        }
    }
}

/// Response from a test request with its status, headers and JSON body.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Response body as JSON (if present and valid JSON)
    pub json: Value,
}

impl TestResponse {
    /// Asserts that the response has the expected status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match the expected value.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {} but got {} with body: {}",
            expected,
            self.status,
            serde_json::to_string_pretty(&self.json).unwrap_or_default()
        );
        self
    }

    /// Asserts that the response status is OK (200).
    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unknown_route_and_method() {
        let fixture = TestFixture::new().await;

        let response = fixture.get_anonymous("/directors").await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(
            response.json,
            json!({"success": false, "error": 404, "message": "Not found"})
        );

        let token = fixture.token(&["get:actors"]);
        let response = fixture
            .send_json(Method::PUT, "/actors", &json!({}), Some(&token))
            .await;
        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.json["message"], "method not allowed");
    }

    #[tokio::test]
    async fn test_keys_fetched_once_across_requests() {
        let fixture = TestFixture::new().await;
        let token = fixture.token(&["get:actors", "get:movies"]);

        for uri in ["/actors", "/movies", "/actors"] {
            fixture.get(uri, &token).await.assert_ok();
        }

        let requests = fixture.jwks_mock.received_requests().await.unwrap_or_default();
        assert_eq!(requests.len(), 1);
        assert!(fixture.config.auth.jwks_url.ends_with("/.well-known/jwks.json"));
    }
}
