//! In-process transport for tests and the demo daemon.
//!
//! A [`MemoryHub`] plays broker: it owns one inbound channel per attached
//! node and routes by `(target_level, target)`. Targeted sends go to the
//! matching node; broadcasts fan out to every node at the target level
//! except the sender.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::level::Level;
use crate::message::{Message, Target};
use crate::transport::Transport;
use crate::types::{DashlinkError, Result};

const INBOUND_BUFFER: usize = 256;

/// In-process message router.
#[derive(Default)]
pub struct MemoryHub {
    nodes: DashMap<(Level, String), mpsc::Sender<Message>>,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a node, returning its transport and its inbound receiver.
    ///
    /// Attaching the same `(level, id)` twice replaces the earlier channel.
    pub fn attach(
        self: &Arc<Self>,
        level: Level,
        id: impl Into<String>,
    ) -> (Arc<MemoryTransport>, mpsc::Receiver<Message>) {
        let id = id.into();
        let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
        self.nodes.insert((level, id.clone()), tx);
        debug!(%level, node = %id, "node attached to memory hub");
        let transport = Arc::new(MemoryTransport {
            hub: Arc::clone(self),
            level,
            id,
        });
        (transport, rx)
    }

    /// Detach a node. Returns true iff it was attached.
    pub fn detach(&self, level: Level, id: &str) -> bool {
        self.nodes.remove(&(level, id.to_string())).is_some()
    }

    async fn route(&self, from: (Level, &str), message: Message) -> Result<bool> {
        match &message.target {
            Target::Node(id) => {
                let tx = self
                    .nodes
                    .get(&(message.target_level, id.clone()))
                    .map(|entry| entry.value().clone());
                let Some(tx) = tx else {
                    debug!(level = %message.target_level, node = %id, "no such node, message not delivered");
                    return Ok(false);
                };
                tx.send(message)
                    .await
                    .map_err(|_| DashlinkError::Transport("inbound channel closed".into()))?;
                Ok(true)
            }
            Target::Broadcast => {
                // Snapshot the senders first so no map guard is held across await.
                let targets: Vec<mpsc::Sender<Message>> = self
                    .nodes
                    .iter()
                    .filter(|entry| {
                        let (level, id) = entry.key();
                        *level == message.target_level
                            && !(*level == from.0 && id == from.1)
                    })
                    .map(|entry| entry.value().clone())
                    .collect();
                let mut delivered = false;
                for tx in targets {
                    if tx.send(message.clone()).await.is_ok() {
                        delivered = true;
                    }
                }
                Ok(delivered)
            }
        }
    }
}

/// One node's handle on the hub.
pub struct MemoryTransport {
    hub: Arc<MemoryHub>,
    level: Level,
    id: String,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, message: Message) -> Result<bool> {
        self.hub.route((self.level, &self.id), message).await
    }

    fn local_level(&self) -> Level {
        self.level
    }

    fn local_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageType;
    use std::collections::HashMap;

    fn message(target_level: Level, target: Target) -> Message {
        Message {
            id: uuid::Uuid::new_v4().to_string(),
            source_level: Level::Regional,
            source_id: "regional-1".into(),
            target_level,
            target,
            message_type: MessageType::StatusUpdate,
            subject: "test".into(),
            content: String::new(),
            metadata: HashMap::new(),
            requires_ack: false,
            priority: 0,
        }
    }

    #[tokio::test]
    async fn targeted_send_reaches_one_node() {
        let hub = MemoryHub::new();
        let (regional, _rx) = hub.attach(Level::Regional, "regional-1");
        let (_t1, mut rx1) = hub.attach(Level::Branch, "branch-1");
        let (_t2, mut rx2) = hub.attach(Level::Branch, "branch-2");

        let delivered = regional
            .send(message(Level::Branch, Target::Node("branch-1".into())))
            .await
            .unwrap();
        assert!(delivered);
        assert!(rx1.recv().await.is_some());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_excludes_the_sender() {
        let hub = MemoryHub::new();
        let (b1, mut rx1) = hub.attach(Level::Branch, "branch-1");
        let (_t2, mut rx2) = hub.attach(Level::Branch, "branch-2");

        let delivered = b1
            .send(message(Level::Branch, Target::Broadcast))
            .await
            .unwrap();
        assert!(delivered);
        assert!(rx2.recv().await.is_some());
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_target_is_not_an_error() {
        let hub = MemoryHub::new();
        let (regional, _rx) = hub.attach(Level::Regional, "regional-1");
        let delivered = regional
            .send(message(Level::Branch, Target::Node("nope".into())))
            .await
            .unwrap();
        assert!(!delivered);
    }

    #[tokio::test]
    async fn detach_stops_delivery() {
        let hub = MemoryHub::new();
        let (regional, _rx) = hub.attach(Level::Regional, "regional-1");
        let (_t1, _rx1) = hub.attach(Level::Branch, "branch-1");
        assert!(hub.detach(Level::Branch, "branch-1"));
        assert!(!hub.detach(Level::Branch, "branch-1"));
        let delivered = regional
            .send(message(Level::Branch, Target::Broadcast))
            .await
            .unwrap();
        assert!(!delivered);
    }
}
