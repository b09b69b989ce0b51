//! dashlink — hierarchical dashboard data aggregation
//!
//! Dashboards in a courier network run at three levels: branch, regional,
//! and global. Each node hosts an [`AggregationEngine`] that
//!
//! - fans out correlated data requests down the hierarchy and resolves each
//!   exactly once, by response or by timeout
//! - answers inbound requests from dynamically registered [`DataProvider`]s
//! - merges same-typed partial datasets with a recursive, type-aware rule
//!   (numbers sum, lists concatenate, maps recurse)
//! - re-aggregates on a schedule and pushes summaries to a handler
//!
//! The transport that carries messages between nodes is behind the
//! [`Transport`] trait; an in-process [`transport::MemoryHub`] is provided
//! for tests and single-process simulations.

pub mod config;
pub mod engine;
pub mod level;
pub mod message;
pub mod transport;
pub mod types;

pub use engine::{AggregationEngine, AggregationHandler, DataProvider};
pub use level::Level;
pub use message::{DataTransfer, Message, MessageType, Target};
pub use transport::Transport;
pub use types::{DashlinkError, Result};
