//! API client — the single point of entry for all backend calls.
//!
//! ARCHITECTURAL RULE: no other module may issue HTTP requests directly.
//! The client owns the session token store, injects the bearer token on
//! every request, and on a 401 performs exactly one token refresh followed
//! by one retry. Concurrent 401s share a single refresh via a guard mutex;
//! whichever task wins refreshes, the rest re-read the store and retry.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::auth::store::TokenStore;
use crate::errors::AppError;
use crate::models::auth::{AuthTokens, RefreshRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cheaply cloneable handle to the backend.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    base_url: String,
    tokens: TokenStore,
    /// Serializes token refreshes so concurrent 401s trigger one refresh.
    refresh_guard: Mutex<()>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, tokens: TokenStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                http: Client::builder()
                    .timeout(REQUEST_TIMEOUT)
                    .build()
                    .expect("Failed to build HTTP client"),
                base_url: base_url.into().trim_end_matches('/').to_string(),
                tokens,
                refresh_guard: Mutex::new(()),
            }),
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        self.request_json(Method::GET, path, None, &[]).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AppError> {
        self.request_json(Method::POST, path, Some(serde_json::to_value(body)?), &[])
            .await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AppError> {
        self.request_json(Method::PUT, path, Some(serde_json::to_value(body)?), &[])
            .await
    }

    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        self.request_json(Method::PATCH, path, None, query).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), AppError> {
        let response = self.send_with_retry(Method::DELETE, path, &None, &[]).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(api_error(status, response.text().await.unwrap_or_default()))
        }
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let response = self.send_with_retry(method, path, &body, query).await?;
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(api_error(status, response.text().await.unwrap_or_default()))
        }
    }

    /// Sends the request; on a 401 from a non-auth endpoint, refreshes the
    /// access token once and retries once. Auth endpoints never refresh.
    /// A 401 on the retry clears the session rather than looping.
    async fn send_with_retry(
        &self,
        method: Method,
        path: &str,
        body: &Option<Value>,
        query: &[(&str, String)],
    ) -> Result<Response, AppError> {
        let token = self.inner.tokens.access_token();
        let response = self
            .send(method.clone(), path, body, query, token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED || is_auth_path(path) {
            return Ok(response);
        }

        debug!("401 on {path}, attempting token refresh");
        self.refresh_access_token(token.as_deref()).await?;

        let fresh = self.inner.tokens.access_token();
        let retried = self.send(method, path, body, query, fresh.as_deref()).await?;

        // The refreshed token was rejected too: the session is gone.
        if retried.status() == StatusCode::UNAUTHORIZED {
            self.inner.tokens.clear()?;
            return Err(AppError::Unauthorized);
        }
        Ok(retried)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: &Option<Value>,
        query: &[(&str, String)],
        bearer: Option<&str>,
    ) -> Result<Response, reqwest::Error> {
        let mut request = self
            .inner
            .http
            .request(method, format!("{}{}", self.inner.base_url, path));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await
    }

    /// Exchanges the stored refresh token for a new access token.
    /// `stale` is the access token the failed request used: if the stored
    /// token already differs, another task refreshed while we waited on the
    /// guard and there is nothing left to do. Any failure clears the session.
    async fn refresh_access_token(&self, stale: Option<&str>) -> Result<(), AppError> {
        let _guard = self.inner.refresh_guard.lock().await;

        if self.inner.tokens.access_token().as_deref() != stale {
            return Ok(());
        }

        let Some(refresh_token) = self.inner.tokens.refresh_token() else {
            self.inner.tokens.clear()?;
            return Err(if stale.is_none() {
                AppError::NotLoggedIn
            } else {
                AppError::Unauthorized
            });
        };

        let response = self
            .inner
            .http
            .post(format!("{}/auth/refresh", self.inner.base_url))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await;

        let refreshed: Option<AuthTokens> = match response {
            Ok(r) if r.status().is_success() => match r.json().await {
                Ok(tokens) => Some(tokens),
                Err(e) => {
                    warn!("malformed token refresh response: {e}");
                    None
                }
            },
            Ok(r) => {
                warn!("token refresh rejected with status {}", r.status());
                None
            }
            Err(e) => {
                warn!("token refresh request failed: {e}");
                None
            }
        };

        match refreshed {
            Some(tokens) => {
                self.inner
                    .tokens
                    .set(tokens.access_token, tokens.refresh_token)?;
                debug!("access token refreshed");
                Ok(())
            }
            None => {
                self.inner.tokens.clear()?;
                Err(AppError::Unauthorized)
            }
        }
    }
}

fn is_auth_path(path: &str) -> bool {
    path.starts_with("/auth/")
}

/// Decodes the backend's `{"detail": ...}` error body, falling back to the
/// raw text when the body is not in that shape.
fn api_error(status: StatusCode, body: String) -> AppError {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        detail: Value,
    }

    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody {
            detail: Value::String(s),
        }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => body,
    };

    AppError::Api {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use tempfile::tempdir;

    fn client_for(server: &mockito::ServerGuard, dir: &tempfile::TempDir) -> ApiClient {
        ApiClient::new(server.url(), TokenStore::load(dir.path().join("tokens.json")))
    }

    #[test]
    fn test_auth_paths_are_recognized() {
        assert!(is_auth_path("/auth/login"));
        assert!(is_auth_path("/auth/refresh"));
        assert!(!is_auth_path("/prompt/"));
        assert!(!is_auth_path("/prompt/abc/favorite"));
    }

    #[test]
    fn test_api_error_prefers_string_detail() {
        let err = api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": "email already registered"}"#.to_string(),
        );
        match err {
            AppError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "email already registered");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_api_error_falls_back_to_raw_body() {
        let err = api_error(StatusCode::BAD_GATEWAY, "upstream down".to_string());
        match err {
            AppError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bearer_token_is_injected() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempdir().unwrap();
        let api = client_for(&server, &dir);
        api.tokens().set("token-1".to_string(), None).unwrap();

        let mock = server
            .mock("GET", "/prompt/")
            .match_header("authorization", "Bearer token-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"prompts": []}"#)
            .create_async()
            .await;

        let value: Value = api.get("/prompt/").await.unwrap();
        assert_eq!(value["prompts"], serde_json::json!([]));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthenticated_request_sends_no_bearer() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempdir().unwrap();
        let api = client_for(&server, &dir);

        let mock = server
            .mock("POST", "/auth/login")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "a", "refresh_token": "r", "token_type": "bearer"}"#)
            .create_async()
            .await;

        let _: Value = api
            .post("/auth/login", &serde_json::json!({"email": "e", "password": "p"}))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_401_refreshes_once_and_retries() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempdir().unwrap();
        let api = client_for(&server, &dir);
        api.tokens()
            .set("stale".to_string(), Some("refresh-1".to_string()))
            .unwrap();

        let rejected = server
            .mock("GET", "/prompt/")
            .match_header("authorization", "Bearer stale")
            .with_status(401)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .match_body(Matcher::Json(
                serde_json::json!({"refresh_token": "refresh-1"}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "fresh", "token_type": "bearer"}"#)
            .create_async()
            .await;
        let retried = server
            .mock("GET", "/prompt/")
            .match_header("authorization", "Bearer fresh")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"prompts": []}"#)
            .create_async()
            .await;

        let value: Value = api.get("/prompt/").await.unwrap();
        assert_eq!(value["prompts"], serde_json::json!([]));
        rejected.assert_async().await;
        refresh.assert_async().await;
        retried.assert_async().await;

        // New access token stored; refresh token kept from before.
        assert_eq!(api.tokens().access_token().as_deref(), Some("fresh"));
        assert_eq!(api.tokens().refresh_token().as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_a_single_refresh() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempdir().unwrap();
        let api = client_for(&server, &dir);
        api.tokens()
            .set("stale".to_string(), Some("refresh-1".to_string()))
            .unwrap();

        let rejected = server
            .mock("GET", "/prompt/")
            .match_header("authorization", "Bearer stale")
            .with_status(401)
            .expect(2)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .match_body(Matcher::Json(
                serde_json::json!({"refresh_token": "refresh-1"}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "fresh", "token_type": "bearer"}"#)
            .expect(1)
            .create_async()
            .await;
        let retried = server
            .mock("GET", "/prompt/")
            .match_header("authorization", "Bearer fresh")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"prompts": []}"#)
            .expect(2)
            .create_async()
            .await;

        // Both requests go out with the stale token; whichever hits the
        // guard first refreshes, the other re-reads the store and retries.
        let (a, b) = tokio::join!(api.get::<Value>("/prompt/"), api.get::<Value>("/prompt/"));
        assert_eq!(a.unwrap()["prompts"], serde_json::json!([]));
        assert_eq!(b.unwrap()["prompts"], serde_json::json!([]));

        rejected.assert_async().await;
        refresh.assert_async().await;
        retried.assert_async().await;
        assert_eq!(api.tokens().access_token().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_401_after_successful_refresh_ends_the_session() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempdir().unwrap();
        let api = client_for(&server, &dir);
        api.tokens()
            .set("stale".to_string(), Some("refresh-1".to_string()))
            .unwrap();

        let rejected = server
            .mock("GET", "/prompt/")
            .match_header("authorization", "Bearer stale")
            .with_status(401)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "fresh", "token_type": "bearer"}"#)
            .create_async()
            .await;
        let still_rejected = server
            .mock("GET", "/prompt/")
            .match_header("authorization", "Bearer fresh")
            .with_status(401)
            .create_async()
            .await;

        let err = api.get::<Value>("/prompt/").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        rejected.assert_async().await;
        refresh.assert_async().await;
        still_rejected.assert_async().await;
        assert!(!api.tokens().is_logged_in());
    }

    #[tokio::test]
    async fn test_auth_endpoints_never_trigger_refresh() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempdir().unwrap();
        let api = client_for(&server, &dir);
        api.tokens()
            .set("stale".to_string(), Some("refresh-1".to_string()))
            .unwrap();

        let login = server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail": "bad credentials"}"#)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let err = api
            .post::<_, Value>("/auth/login", &serde_json::json!({"email": "e", "password": "x"}))
            .await
            .unwrap_err();
        match err {
            AppError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "bad credentials");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        login.assert_async().await;
        refresh.assert_async().await;

        // A failed login does not clear an existing session.
        assert!(api.tokens().is_logged_in());
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_the_session() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempdir().unwrap();
        let api = client_for(&server, &dir);
        api.tokens()
            .set("stale".to_string(), Some("refresh-1".to_string()))
            .unwrap();

        let _rejected = server
            .mock("GET", "/prompt/")
            .with_status(401)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail": "refresh token expired"}"#)
            .create_async()
            .await;

        let err = api.get::<Value>("/prompt/").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
        refresh.assert_async().await;
        assert!(!api.tokens().is_logged_in());
    }

    #[tokio::test]
    async fn test_401_without_a_session_reports_not_logged_in() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempdir().unwrap();
        let api = client_for(&server, &dir);

        let _rejected = server
            .mock("GET", "/prompt/")
            .with_status(401)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let err = api.get::<Value>("/prompt/").await.unwrap_err();
        assert!(matches!(err, AppError::NotLoggedIn));
        refresh.assert_async().await;
    }
}
