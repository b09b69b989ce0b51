//! Aggregation engine core
//!
//! One [`AggregationEngine`] per node owns the three pieces of shared state —
//! the provider registry, the pending-request table, and the schedule table —
//! as instance fields. Everything else reaches them through the narrow
//! operations in the submodules:
//!
//! - `providers` — dynamic data-source registration and collection
//! - `correlation` — request fan-out and single-resolution waiting
//! - `aggregate` — the recursive, type-aware merge
//! - `scheduler` — periodic re-aggregation jobs
//! - `dispatcher` — inbound message routing

mod aggregate;
mod correlation;
mod dispatcher;
mod providers;
mod scheduler;

pub use providers::DataProvider;
pub use scheduler::AggregationHandler;

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::level::Level;
use crate::message::DataTransfer;
use crate::transport::Transport;

/// Hierarchical dashboard data-aggregation engine.
///
/// Construct one per node with [`AggregationEngine::new`] and drive its
/// inbound side with [`AggregationEngine::run_inbound`].
pub struct AggregationEngine {
    transport: Arc<dyn Transport>,
    providers: DashMap<String, providers::ProviderEntry>,
    pending: DashMap<String, oneshot::Sender<DataTransfer>>,
    schedules: DashMap<String, JoinHandle<()>>,
    /// Weak self-handle for ticker tasks, set at construction.
    self_ref: Weak<AggregationEngine>,
}

impl AggregationEngine {
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            transport,
            providers: DashMap::new(),
            pending: DashMap::new(),
            schedules: DashMap::new(),
            self_ref: self_ref.clone(),
        })
    }

    /// The hierarchy level this engine's node sits at.
    pub fn local_level(&self) -> Level {
        self.transport.local_level()
    }

    /// This engine's node id.
    pub fn local_id(&self) -> &str {
        self.transport.local_id()
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) fn weak_ref(&self) -> Weak<AggregationEngine> {
        self.self_ref.clone()
    }
}

impl Drop for AggregationEngine {
    fn drop(&mut self) {
        // Ticker tasks hold only a Weak back to the engine, so they do not
        // keep it alive; abort them so they stop with it.
        for entry in self.schedules.iter() {
            entry.value().abort();
        }
    }
}
