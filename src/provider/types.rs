//! Request and response types for the model client boundary.
//!
//! These types abstract away provider-specific wire formats: the engine
//! builds a [`ModelRequest`], the client answers with a [`ModelResponse`]
//! carrying text, requested tool invocations, and token usage.

use crate::message::Message;
use serde::{Deserialize, Serialize};

/// A tool schema advertised to the model.
///
/// This is the model-facing projection of a registered tool: name,
/// description, and a JSON Schema for its parameters. Execution stays on the
/// dispatcher side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name (function name).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema describing the tool's input.
    pub parameters: serde_json::Value,
}

impl ToolSchema {
    /// Create a new tool schema.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Validate that the parameters form a usable JSON Schema.
    pub fn validate(&self) -> anyhow::Result<()> {
        let obj = match self.parameters.as_object() {
            Some(obj) => obj,
            None => anyhow::bail!("Tool parameters must be a JSON object (schema)"),
        };
        if !obj.contains_key("type") {
            anyhow::bail!("Tool parameters schema must have 'type' field");
        }
        Ok(())
    }
}

/// A tool invocation requested by the model.
///
/// The `id` is the model-assigned correlation key; the tool_result entry fed
/// back to the model must carry the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Correlation id assigned by the model.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Arguments as parsed JSON.
    pub arguments: serde_json::Value,
}

impl ToolInvocation {
    /// Create a new tool invocation.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Token counts reported by the model for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt-side tokens.
    pub input: u64,
    /// Completion-side tokens.
    pub output: u64,
}

impl TokenUsage {
    /// Create a usage record.
    pub fn new(input: u64, output: u64) -> Self {
        Self { input, output }
    }

    /// Accumulate another call's usage into this one.
    pub fn add(&mut self, other: TokenUsage) {
        self.input += other.input;
        self.output += other.output;
    }
}

/// One generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Model to use (None = client default).
    pub model_name: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// System prompt prepended by the client in its own wire format.
    pub system_prompt: String,
    /// Conversation window, oldest first.
    pub messages: Vec<Message>,
    /// Tools the model may request.
    pub tools: Vec<ToolSchema>,
}

impl ModelRequest {
    /// Create a request with the given system prompt and message window.
    pub fn new(system_prompt: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model_name: None,
            temperature: None,
            max_tokens: None,
            system_prompt: system_prompt.into(),
            messages,
            tools: Vec::new(),
        }
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = Some(model.into());
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the completion token cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the advertised tools.
    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }
}

/// The model's answer to one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Generated text (may be empty when only tools were requested).
    pub text: String,
    /// Tool invocations requested this turn, in model order.
    #[serde(default)]
    pub tool_calls: Vec<ToolInvocation>,
    /// Token usage for the call.
    #[serde(default)]
    pub usage: TokenUsage,
}

impl ModelResponse {
    /// A plain text response with no tool calls.
    pub fn text(text: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
            usage,
        }
    }

    /// A response requesting tool invocations.
    pub fn with_tool_calls(
        text: impl Into<String>,
        tool_calls: Vec<ToolInvocation>,
        usage: TokenUsage,
    ) -> Self {
        Self {
            text: text.into(),
            tool_calls,
            usage,
        }
    }

    /// Whether the model requested any tools this turn.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
