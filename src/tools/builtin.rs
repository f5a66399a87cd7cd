//! Builtin tools.
//!
//! `get_local_time` executes automatically. `get_weather_information` is a
//! schema-only declaration: the model can request it, but it only runs
//! through the confirmation flow after a human approves the call.

use super::{ToolExecutor, ToolRegistry, ToolSpec};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Build the static tool registry.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(ToolSpec::requires_confirmation(
        "get_weather_information",
        "Show the weather in a given city to the user. \
         Requires user confirmation before running.",
        json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "The city to get the weather for"
                }
            },
            "required": ["city"]
        }),
    ));
    registry.register_confirmation("get_weather_information", Arc::new(WeatherExecutor));

    registry.register(ToolSpec::auto(
        "get_local_time",
        "Get the current local time for a specified location.",
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "The location to get the time for"
                }
            },
            "required": ["location"]
        }),
        Arc::new(LocalTimeTool),
    ));

    registry
}

/// Confirmation executor for the weather tool.
struct WeatherExecutor;

#[async_trait]
impl ToolExecutor for WeatherExecutor {
    async fn execute(&self, input: Value) -> Result<Value> {
        let city = input
            .get("city")
            .and_then(|v| v.as_str())
            .unwrap_or("the requested city");
        Ok(json!(format!("The weather in {} is sunny.", city)))
    }
}

/// Auto-executing local time tool.
struct LocalTimeTool;

#[async_trait]
impl ToolExecutor for LocalTimeTool {
    async fn execute(&self, input: Value) -> Result<Value> {
        let location = input
            .get("location")
            .and_then(|v| v.as_str())
            .unwrap_or("local");
        let now = chrono::Local::now();
        Ok(json!({
            "location": location,
            "time": now.format("%H:%M").to_string(),
        }))
    }
}
