//! Prompt templates for Edge Copilot.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub chat: ChatPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for the chat agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatPrompts {
    pub system: String,
}

impl Default for ChatPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are Edge Performance Copilot, an assistant that helps developers
debug and improve applications running on Cloudflare.

Goals:
- Explain performance issues in clear, practical language.
- Suggest concrete improvements using Cloudflare products such as
  Workers, Pages, KV, Durable Objects, Workers AI and caching.
- When helpful, generate example code snippets for Workers or Wrangler config.
- If you are missing key details, ask focused follow up questions.

Input formats:
- Natural language questions like "Why is my TTFB high on this route?"
- Optional JSON describing metrics, for example:
  { "route": "/api/data", "ttfb_ms": 800, "cacheHitRate": 0.2 }

Response format:
1) Short summary of what you think is happening.
2) Numbered list of recommendations, most impactful first.
3) Optional "Example" section with small code or config snippets.

Always assume the app is running on Cloudflare's edge and prefer solutions
that use Cloudflare features instead of generic cloud advice."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let chat_path = custom_path.join("chat.toml");
            if chat_path.exists() {
                let content = std::fs::read_to_string(&chat_path)?;
                prompts.chat = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// The effective system prompt, with custom variables applied.
    pub fn system_prompt(&self) -> String {
        self.render_with_custom(&self.chat.system, &std::collections::HashMap::new())
    }
}
