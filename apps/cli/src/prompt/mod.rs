//! Prompt service — CRUD and favorites over the backend's `/prompt/` API.

use uuid::Uuid;

use crate::api::ApiClient;
use crate::errors::AppError;
use crate::models::prompt::{NewPrompt, Prompt, PromptList};

pub async fn list(api: &ApiClient) -> Result<Vec<Prompt>, AppError> {
    let response: PromptList = api.get("/prompt/").await?;
    Ok(response.prompts)
}

pub async fn get(api: &ApiClient, id: Uuid) -> Result<Prompt, AppError> {
    api.get(&format!("/prompt/{id}")).await
}

/// Submits a prompt for optimization and returns the stored record,
/// including the backend's optimized rewrite.
pub async fn improve(api: &ApiClient, text: &str) -> Result<Prompt, AppError> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("prompt text is empty".to_string()));
    }
    api.post(
        "/prompt/improve",
        &NewPrompt {
            prompt: text.to_string(),
        },
    )
    .await
}

/// Replaces the original prompt text and re-optimizes it.
pub async fn update(api: &ApiClient, id: Uuid, text: &str) -> Result<Prompt, AppError> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("prompt text is empty".to_string()));
    }
    api.put(
        &format!("/prompt/{id}"),
        &NewPrompt {
            prompt: text.to_string(),
        },
    )
    .await
}

pub async fn delete(api: &ApiClient, id: Uuid) -> Result<(), AppError> {
    api.delete(&format!("/prompt/{id}")).await
}

pub async fn favorites(api: &ApiClient) -> Result<Vec<Prompt>, AppError> {
    let response: PromptList = api.get("/prompt/favorites").await?;
    Ok(response.prompts)
}

pub async fn set_favorite(api: &ApiClient, id: Uuid, favorite: bool) -> Result<Prompt, AppError> {
    api.patch(
        &format!("/prompt/{id}/favorite"),
        &[("favorite", favorite.to_string())],
    )
    .await
}
