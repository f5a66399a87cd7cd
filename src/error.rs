//! Error types for Edge Copilot.

use thiserror::Error;

/// Library-level error type for Edge Copilot operations.
#[derive(Error, Debug)]
pub enum CopilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Tool provider error: {0}")]
    Mcp(String),

    #[error("Message store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),
}

/// Result type alias for Edge Copilot operations.
pub type Result<T> = std::result::Result<T, CopilotError>;
