//! Shared full-history view of a run's messages.

use crate::message::Message;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The complete message history of a run, shared between the engine task and
/// whoever persists checkpoints.
///
/// The engine appends; observers snapshot. The windowed view handed to the
/// model and the full history persisted to storage are two reads of this one
/// structure.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl Transcript {
    /// An empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// A transcript seeded with prior history.
    pub fn seeded(messages: Vec<Message>) -> Self {
        Self {
            messages: Arc::new(Mutex::new(messages)),
        }
    }

    /// Append one message.
    pub async fn push(&self, message: Message) {
        self.messages.lock().await.push(message);
    }

    /// The full history, cloned.
    pub async fn snapshot(&self) -> Vec<Message> {
        self.messages.lock().await.clone()
    }

    /// The most recent `n` messages, cloned, oldest first.
    pub async fn window(&self, n: usize) -> Vec<Message> {
        let messages = self.messages.lock().await;
        let skip = messages.len().saturating_sub(n);
        messages[skip..].to_vec()
    }

    /// Number of messages so far.
    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    /// Whether the transcript has no messages.
    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_window_returns_most_recent() {
        let transcript = Transcript::new();
        for i in 0..5 {
            transcript.push(Message::user(format!("m{}", i))).await;
        }

        let window = transcript.window(2).await;
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].content, "m3");
        assert_eq!(window[1].content, "m4");

        // A window wider than the history returns everything
        assert_eq!(transcript.window(100).await.len(), 5);
    }

    #[tokio::test]
    async fn test_clones_share_history() {
        let transcript = Transcript::new();
        let view = transcript.clone();
        transcript.push(Message::user("hello")).await;

        assert_eq!(view.len().await, 1);
        assert_eq!(view.snapshot().await[0].content, "hello");
    }
}
