//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Set { key, value } => {
            let mut settings = settings;
            apply_set(&mut settings, key, value)?;
            settings.save()?;
            Output::success(&format!("Set {} = {}", key, value));
            Output::info(&format!(
                "Saved to {}",
                Settings::default_config_path().display()
            ));
        }

        ConfigAction::Path => {
            let config_path = Settings::default_config_path();
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

/// Apply a `section.key = value` assignment to the settings.
fn apply_set(settings: &mut Settings, key: &str, value: &str) -> Result<()> {
    match key {
        "general.log_level" => settings.general.log_level = value.to_string(),
        "server.host" => settings.server.host = value.to_string(),
        "server.port" => {
            settings.server.port = value
                .parse::<u16>()
                .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))?;
        }
        "model.model" => settings.model.model = value.to_string(),
        "model.max_steps" => {
            settings.model.max_steps = value
                .parse::<usize>()
                .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))?;
        }
        "model.temperature" => {
            settings.model.temperature = value
                .parse::<f32>()
                .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))?;
        }
        "prompts.custom_dir" => settings.prompts.custom_dir = Some(value.to_string()),
        _ => {
            return Err(anyhow::anyhow!(
                "Unknown configuration key: {} (try e.g. server.port, model.max_steps)",
                key
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_known_keys() {
        let mut settings = Settings::default();
        apply_set(&mut settings, "server.port", "8080").unwrap();
        apply_set(&mut settings, "model.max_steps", "5").unwrap();
        apply_set(&mut settings, "model.model", "gpt-4o").unwrap();

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.model.max_steps, 5);
        assert_eq!(settings.model.model, "gpt-4o");
    }

    #[test]
    fn test_set_rejects_unknown_key() {
        let mut settings = Settings::default();
        let result = apply_set(&mut settings, "nope.nothing", "x");
        assert!(result.is_err());
    }

    #[test]
    fn test_set_rejects_unparseable_value() {
        let mut settings = Settings::default();
        let result = apply_set(&mut settings, "server.port", "not-a-port");
        assert!(result.is_err());
        assert_eq!(settings.server.port, 3000);
    }
}
