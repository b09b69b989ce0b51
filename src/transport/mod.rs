//! Transport seam between the engine and whatever carries messages.
//!
//! The engine only ever sends through this trait and learns its own identity
//! from it. Inbound delivery is a plain `mpsc::Receiver<Message>` handed to
//! [`crate::engine::AggregationEngine::run_inbound`], so any transport that
//! can push messages into a channel can drive an engine.

use async_trait::async_trait;

use crate::level::Level;
use crate::message::Message;
use crate::types::Result;

pub mod memory;

pub use memory::{MemoryHub, MemoryTransport};

/// Outbound message transport plus local node identity.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand a message to the transport.
    ///
    /// Resolves once the message is accepted for delivery; the returned flag
    /// says whether anyone acknowledged it (for the in-memory hub, whether
    /// any node was listening). Errors are delivery failures, not negative
    /// acks — the transport does not retry internally.
    async fn send(&self, message: Message) -> Result<bool>;

    /// The hierarchy level this node sits at.
    fn local_level(&self) -> Level;

    /// This node's identifier.
    fn local_id(&self) -> &str;
}
