use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user prompt with its backend-generated optimized rewrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: Uuid,
    pub original_prompt: String,
    pub optimized_prompt: String,
    pub explanation: String,
    pub total_tokens: u32,
    pub created_at: DateTime<Utc>,
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPrompt {
    pub prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptList {
    pub prompts: Vec<Prompt>,
}
