//! Tool registry for the chat agent.
//!
//! Tools come in two flavors, fixed at registration time:
//! - auto-executing tools carry a handler and run as soon as the model
//!   invokes them;
//! - schema-only declarations require a separate human confirmation step,
//!   with their executor registered in a parallel map keyed by tool name.

mod builtin;

pub use builtin::builtin_registry;

use crate::error::Result;
use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An executable tool capability.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run the tool with the given JSON input and return its result.
    async fn execute(&self, input: Value) -> Result<Value>;
}

/// Declaration of a single tool exposed to the model.
#[derive(Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's input.
    pub parameters: Value,
    /// Auto-execution handler. `None` means the tool only runs through
    /// the confirmation flow.
    handler: Option<Arc<dyn ToolExecutor>>,
}

impl ToolSpec {
    /// Declare an auto-executing tool.
    pub fn auto(
        name: &str,
        description: &str,
        parameters: Value,
        handler: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            handler: Some(handler),
        }
    }

    /// Declare a schema-only tool that requires human confirmation.
    pub fn requires_confirmation(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            handler: None,
        }
    }

    /// Whether the tool executes automatically when the model invokes it.
    pub fn is_auto(&self) -> bool {
        self.handler.is_some()
    }
}

/// Mapping of tool name to capability, plus confirmation executors.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolSpec>,
    confirmations: BTreeMap<String, Arc<dyn ToolExecutor>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool declaration.
    pub fn register(&mut self, spec: ToolSpec) {
        self.tools.insert(spec.name.clone(), spec);
    }

    /// Register the confirmation-execution implementation for a tool.
    pub fn register_confirmation(&mut self, name: &str, executor: Arc<dyn ToolExecutor>) {
        self.confirmations.insert(name.to_string(), executor);
    }

    /// Look up a tool declaration by name.
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    /// Auto-execution handler for a tool, if it has one.
    pub fn executor(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.tools.get(name).and_then(|t| t.handler.clone())
    }

    /// Confirmation executor for a tool, if registered.
    pub fn confirmation(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.confirmations.get(name).cloned()
    }

    /// Union with another registry. Entries already present win on name
    /// collision, so statically registered tools are never overridden by
    /// discovered ones.
    pub fn merge(&mut self, other: ToolRegistry) {
        for (name, spec) in other.tools {
            self.tools.entry(name).or_insert(spec);
        }
        for (name, exec) in other.confirmations {
            self.confirmations.entry(name).or_insert(exec);
        }
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Names of all registered tools.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// OpenAI function/tool definitions for every registered tool.
    pub fn definitions(&self) -> Vec<ChatCompletionTool> {
        self.tools
            .values()
            .map(|spec| ChatCompletionTool {
                r#type: ChatCompletionToolType::Function,
                function: FunctionObject {
                    name: spec.name.clone(),
                    description: Some(spec.description.clone()),
                    parameters: Some(spec.parameters.clone()),
                    strict: None,
                },
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Executor returning a fixed value, for tests.
    pub struct FixedExecutor(pub Value);

    #[async_trait]
    impl ToolExecutor for FixedExecutor {
        async fn execute(&self, _input: Value) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    /// Executor that always fails, for tests.
    pub struct FailingExecutor;

    #[async_trait]
    impl ToolExecutor for FailingExecutor {
        async fn execute(&self, _input: Value) -> Result<Value> {
            Err(crate::error::CopilotError::Tool(
                "backend unavailable".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FixedExecutor;
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({"type": "object", "properties": {}})
    }

    #[test]
    fn test_static_tools_win_on_merge_collision() {
        let mut base = ToolRegistry::new();
        base.register(ToolSpec::auto(
            "lookup",
            "static lookup",
            schema(),
            Arc::new(FixedExecutor(json!("static"))),
        ));

        let mut discovered = ToolRegistry::new();
        discovered.register(ToolSpec::auto(
            "lookup",
            "discovered lookup",
            schema(),
            Arc::new(FixedExecutor(json!("discovered"))),
        ));
        discovered.register(ToolSpec::auto(
            "extra",
            "only discovered",
            schema(),
            Arc::new(FixedExecutor(json!("extra"))),
        ));

        base.merge(discovered);

        assert_eq!(base.len(), 2);
        assert_eq!(base.get("lookup").unwrap().description, "static lookup");
        assert!(base.get("extra").is_some());
    }

    #[test]
    fn test_confirmation_tools_have_no_auto_handler() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolSpec::requires_confirmation(
            "get_weather_information",
            "weather",
            schema(),
        ));
        registry.register_confirmation(
            "get_weather_information",
            Arc::new(FixedExecutor(json!("sunny"))),
        );

        assert!(registry.executor("get_weather_information").is_none());
        assert!(registry.confirmation("get_weather_information").is_some());
        assert!(!registry.get("get_weather_information").unwrap().is_auto());
    }

    #[test]
    fn test_definitions_cover_all_tools() {
        let registry = builtin_registry();
        let defs = registry.definitions();
        assert_eq!(defs.len(), registry.len());
        assert!(defs
            .iter()
            .any(|d| d.function.name == "get_weather_information"));
    }
}
