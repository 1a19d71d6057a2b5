pub mod auth;
pub mod prompt;
