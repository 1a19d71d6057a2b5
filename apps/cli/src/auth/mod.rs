//! Auth service — account registration, login, and profile calls.
//! Successful token responses are persisted through the client's store so
//! the session survives between invocations.

pub mod store;

use tracing::debug;

use crate::api::ApiClient;
use crate::errors::AppError;
use crate::models::auth::{AuthTokens, LoginRequest, Me, RegisterRequest, UpdateMe};

pub async fn register(api: &ApiClient, request: &RegisterRequest) -> Result<AuthTokens, AppError> {
    let tokens: AuthTokens = api.post("/auth/register", request).await?;
    store_session(api, &tokens)?;
    debug!("registered account for {}", request.email);
    Ok(tokens)
}

pub async fn login(api: &ApiClient, request: &LoginRequest) -> Result<AuthTokens, AppError> {
    let tokens: AuthTokens = api.post("/auth/login", request).await?;
    store_session(api, &tokens)?;
    debug!("logged in as {}", request.email);
    Ok(tokens)
}

pub async fn me(api: &ApiClient) -> Result<Me, AppError> {
    api.get("/auth/me").await
}

pub async fn update_me(api: &ApiClient, request: &UpdateMe) -> Result<Me, AppError> {
    if request.is_empty() {
        return Err(AppError::Validation(
            "nothing to update; pass at least one of --email, --username, --full-name".to_string(),
        ));
    }
    api.put("/auth/me", request).await
}

pub fn logout(api: &ApiClient) -> Result<(), AppError> {
    api.tokens().clear()
}

fn store_session(api: &ApiClient, tokens: &AuthTokens) -> Result<(), AppError> {
    api.tokens()
        .set(tokens.access_token.clone(), tokens.refresh_token.clone())
}
