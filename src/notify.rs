//! Completion / Notification Protocol (spec.md §4.8).
//!
//! Every activity state machine finalizes into a [`CompletionMessage`],
//! buffered per-agent in FIFO order and flushed once per tick over UDP.
//! The wire format is JSON, matching every other payload in this crate —
//! the protocol is explicitly lossy (UDP); the controller is expected to
//! reconcile via the action queue's `get_result` rather than rely on
//! delivery.

use log::{debug, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// `status` field of the completion payload (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Queued,
    Completed,
    Cancelled,
    Failed,
    Depleted,
}

/// The wire payload correlated by the controller on `action_id` (spec.md
/// §4.8).
#[derive(Debug, Clone, Serialize)]
pub struct CompletionMessage {
    pub action_id: String,
    pub agent_id: u64,
    pub action_type: String,
    pub start_tick: u64,
    pub completion_tick: u64,
    pub success: bool,
    pub status: CompletionStatus,
    pub result: serde_json::Value,
}

/// Per-agent outbound FIFO (spec.md §3 "an outbound message buffer"). Kept
/// as a thin wrapper rather than a bare `Vec` so the flush/enqueue
/// operations stay symmetric with the rest of the agent's data model.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    messages: VecDeque<CompletionMessage>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, message: CompletionMessage) {
        self.messages.push_back(message);
    }

    /// Drain every buffered message in FIFO order (spec.md §4.8 "flushed
    /// after the tick in FIFO order").
    pub fn drain(&mut self) -> Vec<CompletionMessage> {
        self.messages.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// UDP delivery side-channel (spec.md §4.8 "sent over the UDP side-channel
/// to a fixed port"). Delivery failures are logged and swallowed: per
/// spec.md §4.8, "UDP notifications are an optimization, not a
/// correctness dependency."
pub struct UdpNotifier {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl UdpNotifier {
    /// Bind an ephemeral local socket and target `destination` (typically
    /// `127.0.0.1:<completion_udp_port>`, spec.md §6).
    pub async fn bind(destination: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Self { socket, destination })
    }

    /// Send every message as its own JSON-encoded datagram.
    pub async fn send_all(&self, messages: &[CompletionMessage]) {
        for message in messages {
            match serde_json::to_vec(message) {
                Ok(bytes) => {
                    if let Err(err) = self.socket.send_to(&bytes, self.destination).await {
                        warn!(
                            "failed to deliver completion for action {}: {}",
                            message.action_id, err
                        );
                    } else {
                        debug!("delivered completion for action {}", message.action_id);
                    }
                }
                Err(err) => warn!("failed to encode completion for action {}: {}", message.action_id, err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(action_id: &str) -> CompletionMessage {
        CompletionMessage {
            action_id: action_id.to_string(),
            agent_id: 1,
            action_type: "walk_to".to_string(),
            start_tick: 10,
            completion_tick: 42,
            success: true,
            status: CompletionStatus::Completed,
            result: serde_json::json!({ "final_position": { "x": 1.0, "y": 2.0 } }),
        }
    }

    #[test]
    fn buffer_drains_in_fifo_order() {
        let mut buffer = MessageBuffer::new();
        buffer.enqueue(sample("a1"));
        buffer.enqueue(sample("a2"));
        let drained = buffer.drain();
        assert_eq!(drained[0].action_id, "a1");
        assert_eq!(drained[1].action_id, "a2");
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn udp_notifier_delivers_without_panicking_on_closed_receiver() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = receiver.local_addr().unwrap();
        drop(receiver);

        let notifier = UdpNotifier::bind(addr).await.unwrap();
        notifier.send_all(&[sample("a1")]).await;
    }
}
