//! Request fan-out and response correlation.
//!
//! Pending requests live in a DashMap keyed by request id. The response path
//! and the timeout race by removing the entry; whichever side loses finds
//! nothing and does nothing, so a request resolves exactly once.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use super::AggregationEngine;
use crate::level::Level;
use crate::message::{
    meta, DataTransfer, Message, MessageType, Target, CATALOG_DATA_TYPE, CATALOG_KEY,
    LIST_DATA_TYPES,
};
use crate::types::{DashlinkError, Result};

/// Deadline for catalog queries and scheduled ticks.
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

impl AggregationEngine {
    /// Fan out a data request and wait for the first matching response.
    ///
    /// The pending entry is registered before anything is sent, so a response
    /// can never arrive before the table knows about the request. A transport
    /// failure leaves the entry armed: the caller observes the same
    /// [`DashlinkError::Timeout`] it would for an unanswered request, and is
    /// never blocked beyond the deadline.
    ///
    /// An empty `target_ids` means one broadcast to every node at
    /// `target_level`; otherwise one copy is sent per target id. Responses
    /// from a multi-target fan-out race; the first one wins. Callers that
    /// want every response should issue one targeted request per node and
    /// combine the results with [`aggregate_data`](Self::aggregate_data).
    pub async fn request_and_aggregate_data(
        &self,
        data_type: &str,
        filter_criteria: Option<&str>,
        target_level: Level,
        target_ids: &[String],
        deadline: Duration,
    ) -> Result<DataTransfer> {
        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);

        let targets: Vec<Target> = if target_ids.is_empty() {
            vec![Target::Broadcast]
        } else {
            target_ids.iter().cloned().map(Target::Node).collect()
        };

        for target in targets {
            let message =
                self.data_request(&request_id, data_type, filter_criteria, target_level, target);
            if let Err(e) = self.transport().send(message).await {
                warn!(
                    request_id = %request_id,
                    data_type,
                    error = %e,
                    "data request send failed; the request will time out"
                );
            }
        }

        match timeout(deadline, rx).await {
            Ok(Ok(transfer)) => Ok(transfer),
            Ok(Err(_)) => {
                // Sender dropped without resolving; treat as unanswered.
                self.pending.remove(&request_id);
                Err(DashlinkError::Timeout)
            }
            Err(_) => {
                self.pending.remove(&request_id);
                debug!(request_id = %request_id, data_type, "request timed out");
                Err(DashlinkError::Timeout)
            }
        }
    }

    /// Push a transfer one level up as an unsolicited broadcast.
    ///
    /// Returns `Ok(false)` without sending when this node is already at the
    /// top of the hierarchy. Empty source identity on the transfer is filled
    /// in from the local node.
    pub async fn send_data_up(&self, mut transfer: DataTransfer) -> Result<bool> {
        let local_level = self.local_level();
        let Some(target_level) = local_level.next_higher() else {
            warn!(level = %local_level, "no higher level to send data to");
            return Ok(false);
        };

        if transfer.source_id.is_empty() {
            transfer.source_level = local_level;
            transfer.source_id = self.local_id().to_string();
        }
        transfer.target_level = Some(target_level);
        transfer.target = Some(Target::Broadcast);

        let mut metadata = HashMap::new();
        metadata.insert(meta::DATA_TYPE.to_string(), transfer.data_type.clone());
        metadata.insert(meta::TRANSFER_ID.to_string(), transfer.id.clone());

        let message = Message {
            id: Uuid::new_v4().to_string(),
            source_level: transfer.source_level,
            source_id: transfer.source_id.clone(),
            target_level,
            target: Target::Broadcast,
            message_type: MessageType::DataResponse,
            subject: format!("data-up:{}", transfer.data_type),
            content: serde_json::to_string(&transfer)?,
            metadata,
            requires_ack: false,
            priority: 0,
        };
        self.transport().send(message).await
    }

    /// Data type names available at `target_level`.
    ///
    /// The local level is answered from the provider registry directly;
    /// other levels are asked over the wire with the catalog sentinel.
    pub async fn get_available_data_types(&self, target_level: Level) -> Result<Vec<String>> {
        if target_level == self.local_level() {
            return Ok(self.local_data_types());
        }
        let transfer = self
            .request_and_aggregate_data(
                CATALOG_DATA_TYPE,
                Some(LIST_DATA_TYPES),
                target_level,
                &[],
                DEFAULT_REQUEST_TIMEOUT,
            )
            .await?;
        let types = transfer
            .data
            .get(CATALOG_KEY)
            .and_then(serde_json::Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(types)
    }

    /// Resolve a pending request with a transfer.
    ///
    /// Returns true iff the entry was still outstanding; resolving an
    /// unknown or already-resolved id is a no-op.
    pub(crate) fn resolve_pending(&self, request_id: &str, transfer: DataTransfer) -> bool {
        match self.pending.remove(request_id) {
            Some((_, tx)) => {
                // The receiver may have just timed out; losing this race is fine.
                let _ = tx.send(transfer);
                true
            }
            None => false,
        }
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    fn data_request(
        &self,
        request_id: &str,
        data_type: &str,
        filter_criteria: Option<&str>,
        target_level: Level,
        target: Target,
    ) -> Message {
        let mut metadata = HashMap::new();
        metadata.insert(meta::DATA_TYPE.to_string(), data_type.to_string());
        metadata.insert(meta::REQUEST_ID.to_string(), request_id.to_string());
        Message {
            id: Uuid::new_v4().to_string(),
            source_level: self.local_level(),
            source_id: self.local_id().to_string(),
            target_level,
            target,
            message_type: MessageType::DataRequest,
            subject: format!("data-request:{}", data_type),
            content: filter_criteria.unwrap_or_default().to_string(),
            metadata,
            requires_ack: true,
            priority: 0,
        }
    }
}
