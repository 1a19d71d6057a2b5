//! File-backed session token storage, shared by the API client (bearer
//! injection, refresh) and the auth commands (login/logout).

use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredTokens {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

/// Persisted session tokens with an in-memory copy for fast reads.
/// All writes go through to the backing file so the session survives
/// between invocations.
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    tokens: RwLock<Option<StoredTokens>>,
}

impl TokenStore {
    /// Opens the store at `path`. A missing or unreadable file means a
    /// logged-out session, never an error.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let tokens = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(tokens) => Some(tokens),
                Err(e) => {
                    warn!("ignoring malformed token file {}: {e}", path.display());
                    None
                }
            },
            Err(_) => None,
        };
        Self {
            path,
            tokens: RwLock::new(tokens),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().map(|t| t.access_token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().and_then(|t| t.refresh_token)
    }

    pub fn is_logged_in(&self) -> bool {
        self.read().is_some()
    }

    /// Stores a new access token. A `None` refresh token keeps the stored
    /// one, since refresh responses omit it while it stays valid.
    pub fn set(&self, access_token: String, refresh_token: Option<String>) -> Result<(), AppError> {
        let updated = {
            let mut guard = self.tokens.write().unwrap_or_else(|e| e.into_inner());
            let refresh_token =
                refresh_token.or_else(|| guard.as_ref().and_then(|t| t.refresh_token.clone()));
            let tokens = StoredTokens {
                access_token,
                refresh_token,
            };
            *guard = Some(tokens.clone());
            tokens
        };
        self.save(&updated)
    }

    /// Forgets the session and removes the backing file.
    pub fn clear(&self) -> Result<(), AppError> {
        *self.tokens.write().unwrap_or_else(|e| e.into_inner()) = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn read(&self) -> Option<StoredTokens> {
        self.tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn save(&self, tokens: &StoredTokens) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(tokens)?)?;
        Ok(())
    }
}
