//! Model client abstraction for multi-provider support.
//!
//! This module defines the core client trait that abstracts away provider-specific
//! implementation details, enabling the run engine to work with multiple LLM
//! providers through a unified interface.

use crate::provider::types::{ModelRequest, ModelResponse};
use anyhow::Result;
use futures_util::Stream;
use std::pin::Pin;

/// One increment of a streaming generation.
///
/// Providers that stream emit zero or more `Delta` chunks followed by exactly
/// one `Final` carrying the assembled response, tool calls, and usage.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    /// Incremental text content.
    Delta {
        /// New text since the previous chunk.
        content: String,
    },
    /// End of the stream.
    Final {
        /// The complete response, including tool calls and token usage.
        response: ModelResponse,
    },
}

/// Type alias for a streaming response.
pub type ModelStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Core trait that all model clients must implement
///
/// This trait provides a unified interface for language-model inference: the
/// engine hands over a [`ModelRequest`] (message window, system prompt, tool
/// schemas) and gets back text, tool invocations, and usage. Wire formats,
/// authentication, and retry-worthy transport details stay inside the client.
///
/// # Example
///
/// ```ignore
/// use ace::provider::{ModelClient, ModelRequest};
///
/// async fn ask(client: &dyn ModelClient) -> anyhow::Result<()> {
///     let request = ModelRequest::new("You are helpful.", vec![]);
///     let response = client.generate(request).await?;
///     println!("{}", response.text);
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    /// Generate a complete, non-streaming response.
    ///
    /// # Arguments
    /// * `request` - Message window, system prompt, sampling knobs, and tool schemas
    ///
    /// # Returns
    /// The model's text, any requested tool invocations, and token usage
    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse>;

    /// Generate a streaming response.
    ///
    /// The default implementation fails; clients that stream override this
    /// together with [`supports_streaming`](Self::supports_streaming).
    ///
    /// # Returns
    /// Stream of [`StreamChunk`]s ending with `StreamChunk::Final`
    async fn generate_stream(&self, request: ModelRequest) -> Result<ModelStream> {
        let _ = request;
        anyhow::bail!("{} does not support streaming", self.client_name())
    }

    /// Whether [`generate_stream`](Self::generate_stream) is usable.
    ///
    /// The engine checks this before choosing the streaming path.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Client name for logging and diagnostics (e.g. "openai", "anthropic").
    fn client_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::types::TokenUsage;

    struct EchoClient;

    #[async_trait::async_trait]
    impl ModelClient for EchoClient {
        async fn generate(&self, request: ModelRequest) -> Result<ModelResponse> {
            let last = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(ModelResponse::text(last, TokenUsage::new(1, 1)))
        }

        fn client_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_default_stream_rejected() {
        let client = EchoClient;
        assert!(!client.supports_streaming());
        let request = ModelRequest::new("system", vec![]);
        let err = client.generate_stream(request).await.err().unwrap();
        assert!(err.to_string().contains("echo"));
    }

    #[tokio::test]
    async fn test_generate_echoes_last_message() {
        let client = EchoClient;
        let request = ModelRequest::new("system", vec![crate::message::Message::user("ping")]);
        let response = client.generate(request).await.unwrap();
        assert_eq!(response.text, "ping");
        assert!(!response.has_tool_calls());
    }
}
