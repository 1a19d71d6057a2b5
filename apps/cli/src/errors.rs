use thiserror::Error;

/// Application-level error type.
/// Commands return `Result<T, AppError>`; `main` maps the failure to a
/// user-facing message and process exit code via [`AppError::report`].
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Maps the error to `(exit_code, user_message)` for terminal output.
    /// Server-side and internal detail is logged, not printed.
    pub fn report(&self) -> (i32, String) {
        match self {
            AppError::Validation(msg) => (2, msg.clone()),
            AppError::NotLoggedIn => (
                1,
                "not logged in; run `promptly login` first".to_string(),
            ),
            AppError::Unauthorized => (
                1,
                "session expired; run `promptly login` again".to_string(),
            ),
            AppError::Api { status, message } => {
                (1, format!("the server rejected the request ({status}): {message}"))
            }
            AppError::Http(e) => {
                tracing::error!("HTTP error: {e}");
                (1, format!("could not reach the server: {e}"))
            }
            AppError::Json(e) => {
                tracing::error!("JSON parse error: {e}");
                (1, "the server returned an unexpected response".to_string())
            }
            AppError::Io(e) => {
                tracing::error!("I/O error: {e}");
                (1, format!("local file error: {e}"))
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (1, "an internal error occurred".to_string())
            }
        }
    }
}
