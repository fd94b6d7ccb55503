//! Per-conversation event buffering for replay-then-live subscriptions.

use crate::engine::AgentEvent;
use std::collections::VecDeque;
use tokio::sync::mpsc;

/// Most recent events retained per conversation for reconnect replay.
const EVENT_BUFFER_CAPACITY: usize = 256;

/// Depth of each subscriber's channel. Must cover a full buffer replay; the
/// remainder absorbs live-event bursts before a slow subscriber is dropped.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 2 * EVENT_BUFFER_CAPACITY;

/// The event log of a conversation's current (or just-finished) run.
///
/// `append` records an event and fans it out to every live subscriber;
/// `subscribe` replays the recorded history into a fresh channel and then
/// attaches it for live delivery. Both happen under the coordinator's buffer
/// lock, so a subscriber never sees a gap or a duplicate between replay and
/// live. A subscriber that stops draining its channel is dropped rather than
/// allowed to stall the run.
#[derive(Debug)]
pub(crate) struct EventBuffer {
    events: VecDeque<AgentEvent>,
    subscribers: Vec<mpsc::Sender<AgentEvent>>,
    terminal: bool,
}

impl EventBuffer {
    pub(crate) fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(EVENT_BUFFER_CAPACITY),
            subscribers: Vec::new(),
            terminal: false,
        }
    }

    /// Record one event and push it to live subscribers.
    pub(crate) fn append(&mut self, event: &AgentEvent) {
        if self.events.len() == EVENT_BUFFER_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event.clone());
        if event.is_terminal() {
            self.terminal = true;
        }

        self.subscribers
            .retain(|subscriber| subscriber.try_send(event.clone()).is_ok());
        if self.terminal {
            // Closing the channels lets drained subscribers observe the end.
            self.subscribers.clear();
        }
    }

    /// Replay recorded history into a new channel, then attach it live.
    pub(crate) fn subscribe(&mut self) -> mpsc::Receiver<AgentEvent> {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        for event in &self.events {
            // Capacity covers a full replay; a failure means the receiver
            // was already dropped, which retain below would catch anyway.
            let _ = sender.try_send(event.clone());
        }
        if !self.terminal {
            self.subscribers.push(sender);
        }
        receiver
    }

    /// Whether the buffered run has reached a terminal event.
    pub(crate) fn is_terminal(&self) -> bool {
        self.terminal
    }
}
