//! Built-in memory tools the engine exposes to the model.

use super::store::MemoryStore;
use crate::tool::{ToolContext, ToolDefinition, ToolError, ToolHandler, ToolSource};
use serde_json::{json, Value};
use std::sync::Arc;

const RECALL_TOOL: &str = "memory_recall";
const APPEND_TOOL: &str = "memory_append";
const DEFAULT_RECALL_LIMIT: usize = 5;

struct RecallHandler {
    store: MemoryStore,
}

#[async_trait::async_trait]
impl ToolHandler for RecallHandler {
    async fn call(&self, input: Value, context: &ToolContext) -> Result<Value, ToolError> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid_arguments(RECALL_TOOL, "query must be a string"))?;
        let limit = input
            .get("limit")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_RECALL_LIMIT);

        let hits = self
            .store
            .recall(&context.agent_id, query, limit)
            .await
            .map_err(|e| ToolError::execution_failed(RECALL_TOOL, e.to_string()))?;

        let hits =
            serde_json::to_value(&hits).map_err(|e| ToolError::serialization_error(e.to_string()))?;
        Ok(json!({ "hits": hits }))
    }
}

struct AppendHandler {
    store: MemoryStore,
}

#[async_trait::async_trait]
impl ToolHandler for AppendHandler {
    async fn call(&self, input: Value, context: &ToolContext) -> Result<Value, ToolError> {
        let content = input
            .get("content")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                ToolError::invalid_arguments(APPEND_TOOL, "content must be a non-empty string")
            })?;

        let entry = self
            .store
            .append(&context.agent_id, content)
            .await
            .map_err(|e| ToolError::execution_failed(APPEND_TOOL, e.to_string()))?;

        Ok(json!({ "remembered": true, "id": entry.id }))
    }
}

/// The recall and append tool definitions over the given store.
///
/// Registered alongside native tools, these let the model consult and grow
/// the agent's cross-conversation memory. Neither requires approval.
pub fn memory_tools(store: &MemoryStore) -> Vec<ToolDefinition> {
    let recall = ToolDefinition::new(
        RECALL_TOOL,
        "Search the agent's long-term memory for entries relevant to a query",
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords or a phrase to look up"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum entries to return (default 5)"
                }
            },
            "required": ["query"]
        }),
        Arc::new(RecallHandler {
            store: store.clone(),
        }),
    )
    .with_source(ToolSource::Memory);

    let append = ToolDefinition::new(
        APPEND_TOOL,
        "Save a note to the agent's long-term memory",
        json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The note to remember"
                }
            },
            "required": ["content"]
        }),
        Arc::new(AppendHandler {
            store: store.clone(),
        }),
    )
    .with_source(ToolSource::Memory);

    vec![recall, append]
}
