//! Configuration module for Edge Copilot.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ChatPrompts, Prompts};
pub use settings::{
    GeneralSettings, McpServerSettings, McpSettings, ModelSettings, PromptSettings,
    ServerSettings, Settings,
};
