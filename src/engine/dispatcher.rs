//! Inbound message routing.
//!
//! Every inbound message is classified by type: data requests are answered
//! from the provider registry, data responses resolve their pending request,
//! and everything else passes through untouched. Malformed traffic is logged
//! and dropped; the dispatcher itself never fails.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::AggregationEngine;
use crate::message::{
    meta, DataTransfer, Message, MessageType, Target, CATALOG_DATA_TYPE, CATALOG_KEY,
    LIST_DATA_TYPES,
};

impl AggregationEngine {
    /// Drain an inbound channel, dispatching each message and sending any
    /// produced response back through the transport.
    pub async fn run_inbound(self: Arc<Self>, mut inbound: mpsc::Receiver<Message>) {
        while let Some(message) = inbound.recv().await {
            if let Some(response) = self.dispatch(message).await {
                if let Err(e) = self.transport().send(response).await {
                    warn!(error = %e, "failed to send response");
                }
            }
        }
        debug!(node = %self.local_id(), "inbound channel closed, dispatcher stopping");
    }

    /// Route one inbound message. Returns a response message when one is due.
    pub async fn dispatch(&self, message: Message) -> Option<Message> {
        match message.message_type {
            MessageType::DataRequest => self.handle_data_request(message).await,
            MessageType::DataResponse => {
                self.handle_data_response(message);
                None
            }
            // Non-aggregation traffic; other subsystems consume these.
            MessageType::StatusUpdate | MessageType::Alert => None,
        }
    }

    async fn handle_data_request(&self, request: Message) -> Option<Message> {
        if request.content == LIST_DATA_TYPES {
            let mut data = serde_json::Map::new();
            data.insert(CATALOG_KEY.to_string(), json!(self.local_data_types()));
            let transfer = self.addressed_transfer(&request, CATALOG_DATA_TYPE, data, None);
            return self.data_response(&request, transfer);
        }

        let Some(data_type) = request.metadata.get(meta::DATA_TYPE).cloned() else {
            warn!(id = %request.id, subject = %request.subject, "data request without a dataType, dropping");
            return None;
        };

        let filter = (!request.content.is_empty()).then_some(request.content.as_str());
        let data = self.collect(&data_type, filter).await;
        debug!(
            %data_type,
            keys = data.len(),
            requester = %request.source_id,
            "collected provider data for request"
        );
        let transfer = self.addressed_transfer(&request, &data_type, data, filter);
        self.data_response(&request, transfer)
    }

    fn handle_data_response(&self, message: Message) {
        let Some(request_id) = message.metadata.get(meta::REQUEST_ID).cloned() else {
            // Unsolicited transfers (e.g. send_data_up broadcasts) land here.
            warn!(id = %message.id, subject = %message.subject, "response without a requestId, dropping");
            return;
        };

        let transfer = match serde_json::from_str::<DataTransfer>(&message.content) {
            Ok(transfer) => transfer,
            Err(e) => {
                warn!(
                    request_id = %request_id,
                    error = %e,
                    "undecodable transfer in response, dropping"
                );
                return;
            }
        };

        if self.resolve_pending(&request_id, transfer) {
            debug!(request_id = %request_id, "resolved pending request");
        } else {
            warn!(
                request_id = %request_id,
                source = %message.source_id,
                "response for unknown or completed request, dropping"
            );
        }
    }

    /// A transfer carrying `data`, addressed back at the requester.
    fn addressed_transfer(
        &self,
        request: &Message,
        data_type: &str,
        data: serde_json::Map<String, serde_json::Value>,
        filter: Option<&str>,
    ) -> DataTransfer {
        let mut transfer =
            DataTransfer::new(data_type, self.local_level(), self.local_id(), data);
        transfer.target_level = Some(request.source_level);
        transfer.target = Some(Target::Node(request.source_id.clone()));
        transfer.filtered = filter.is_some();
        transfer.filter_criteria = filter.map(str::to_string);
        transfer
    }

    /// Wrap a transfer as the response to `request`.
    ///
    /// The correlation id echoed back is the request's `requestId` metadata
    /// when present, else the request message id.
    fn data_response(&self, request: &Message, transfer: DataTransfer) -> Option<Message> {
        let request_id = request
            .metadata
            .get(meta::REQUEST_ID)
            .cloned()
            .unwrap_or_else(|| request.id.clone());

        let content = match serde_json::to_string(&transfer) {
            Ok(content) => content,
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "failed to encode transfer");
                return None;
            }
        };

        let mut metadata = HashMap::new();
        metadata.insert(meta::DATA_TYPE.to_string(), transfer.data_type.clone());
        metadata.insert(meta::REQUEST_ID.to_string(), request_id);
        metadata.insert(meta::TRANSFER_ID.to_string(), transfer.id.clone());

        Some(Message {
            id: Uuid::new_v4().to_string(),
            source_level: self.local_level(),
            source_id: self.local_id().to_string(),
            target_level: request.source_level,
            target: Target::Node(request.source_id.clone()),
            message_type: MessageType::DataResponse,
            subject: format!("data-response:{}", transfer.data_type),
            content,
            metadata,
            requires_ack: false,
            priority: request.priority,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DataProvider;
    use crate::level::Level;
    use crate::transport::MemoryHub;
    use crate::types::Result;
    use async_trait::async_trait;
    use serde_json::{Map, Value};

    struct CountProvider;

    #[async_trait]
    impl DataProvider for CountProvider {
        async fn provide(
            &self,
            _data_type: &str,
            _filter_criteria: Option<&str>,
        ) -> Result<Map<String, Value>> {
            let mut out = Map::new();
            out.insert("deliveries".into(), json!(4));
            Ok(out)
        }
    }

    fn engine() -> Arc<AggregationEngine> {
        let hub = MemoryHub::new();
        let (transport, _rx) = hub.attach(Level::Branch, "branch-1");
        AggregationEngine::new(transport)
    }

    fn request(content: &str, metadata: &[(&str, &str)]) -> Message {
        Message {
            id: Uuid::new_v4().to_string(),
            source_level: Level::Regional,
            source_id: "regional-1".into(),
            target_level: Level::Branch,
            target: Target::Broadcast,
            message_type: MessageType::DataRequest,
            subject: "data-request".into(),
            content: content.into(),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            requires_ack: true,
            priority: 0,
        }
    }

    #[tokio::test]
    async fn data_request_is_answered_from_providers() {
        let engine = engine();
        engine.register_data_provider("ops", Arc::new(CountProvider));

        let inbound = request("", &[(meta::DATA_TYPE, "ops"), (meta::REQUEST_ID, "req-1")]);
        let response = engine.dispatch(inbound).await.expect("expected a response");

        assert_eq!(response.message_type, MessageType::DataResponse);
        assert_eq!(response.target, Target::Node("regional-1".into()));
        assert_eq!(response.target_level, Level::Regional);
        assert_eq!(response.metadata[meta::REQUEST_ID], "req-1");
        assert_eq!(response.metadata[meta::DATA_TYPE], "ops");
        let transfer: DataTransfer = serde_json::from_str(&response.content).unwrap();
        assert_eq!(transfer.data["deliveries"], json!(4));
        assert_eq!(transfer.source_id, "branch-1");
    }

    #[tokio::test]
    async fn request_without_data_type_is_dropped() {
        let engine = engine();
        let inbound = request("", &[]);
        assert!(engine.dispatch(inbound).await.is_none());
    }

    #[tokio::test]
    async fn catalog_sentinel_lists_registered_types() {
        let engine = engine();
        engine.register_data_provider("ops", Arc::new(CountProvider));
        engine.register_data_provider("shipments", Arc::new(CountProvider));

        let inbound = request(LIST_DATA_TYPES, &[(meta::REQUEST_ID, "req-2")]);
        let response = engine.dispatch(inbound).await.expect("expected a catalog");
        let transfer: DataTransfer = serde_json::from_str(&response.content).unwrap();
        assert_eq!(transfer.data_type, CATALOG_DATA_TYPE);
        assert_eq!(transfer.data[CATALOG_KEY], json!(["ops", "shipments"]));
    }

    #[tokio::test]
    async fn unknown_request_id_response_is_dropped() {
        let engine = engine();
        let mut response = request("", &[(meta::REQUEST_ID, "never-issued")]);
        response.message_type = MessageType::DataResponse;
        response.content =
            serde_json::to_string(&DataTransfer::new("ops", Level::Branch, "b", Map::new()))
                .unwrap();
        // Must not panic and must not produce traffic.
        assert!(engine.dispatch(response).await.is_none());
        assert_eq!(engine.pending_requests(), 0);
    }

    #[tokio::test]
    async fn status_and_alert_traffic_is_ignored() {
        let engine = engine();
        let mut message = request("", &[]);
        message.message_type = MessageType::StatusUpdate;
        assert!(engine.dispatch(message.clone()).await.is_none());
        message.message_type = MessageType::Alert;
        assert!(engine.dispatch(message).await.is_none());
    }
}
