//! Wire types for cross-level dashboard traffic
//!
//! A [`Message`] is the unit the transport carries; a [`DataTransfer`] is the
//! payload envelope for dashboard data, serialized as JSON into
//! `Message.content`. Requests and responses are distinct messages tied
//! together by the `requestId` metadata key, never by `id` equality.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::level::Level;

/// Metadata keys carried on messages and transfers.
pub mod meta {
    pub const DATA_TYPE: &str = "dataType";
    pub const REQUEST_ID: &str = "requestId";
    pub const TRANSFER_ID: &str = "transferId";
    pub const SOURCE_COUNT: &str = "sourceCount";
    pub const AGGREGATED_AT: &str = "aggregatedAt";
}

/// Sentinel request content asking a node for its data-type catalog.
pub const LIST_DATA_TYPES: &str = "list-available-data-types";

/// Data type tag used for catalog responses.
pub const CATALOG_DATA_TYPE: &str = "available-data-types";

/// Key under which a catalog response lists the type names.
pub const CATALOG_KEY: &str = "dataTypes";

/// Message classification.
///
/// Only data requests and responses drive aggregation; status and alert
/// traffic is carried but ignored by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    DataRequest,
    DataResponse,
    StatusUpdate,
    Alert,
}

/// Delivery target: one node at the target level, or every node there.
///
/// Serialized as the node id, with `"all"` meaning broadcast, so the wire
/// form stays compatible while the code never compares magic strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Target {
    Broadcast,
    Node(String),
}

impl From<String> for Target {
    fn from(s: String) -> Self {
        if s == "all" {
            Target::Broadcast
        } else {
            Target::Node(s)
        }
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        match target {
            Target::Broadcast => "all".to_string(),
            Target::Node(id) => id,
        }
    }
}

/// A unit of transport traffic.
///
/// `id` is unique per message instance (uuid v4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub source_level: Level,
    pub source_id: String,
    pub target_level: Level,
    #[serde(rename = "targetId")]
    pub target: Target,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub subject: String,
    /// Free-form: filter criteria on requests, a JSON-encoded
    /// [`DataTransfer`] on responses, or a sentinel command.
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub requires_ack: bool,
    pub priority: i32,
}

/// A unit of dashboard payload.
///
/// A set of transfers is aggregatable only if every member shares the same
/// `data_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTransfer {
    pub id: String,
    pub source_level: Level,
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_level: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "targetId")]
    pub target: Option<Target>,
    pub data_type: String,
    pub data: Map<String, Value>,
    #[serde(default)]
    pub aggregated: bool,
    #[serde(default)]
    pub filtered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_criteria: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl DataTransfer {
    /// A fresh, unaddressed transfer carrying `data`.
    pub fn new(
        data_type: impl Into<String>,
        source_level: Level,
        source_id: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_level,
            source_id: source_id.into(),
            target_level: None,
            target: None,
            data_type: data_type.into(),
            data,
            aggregated: false,
            filtered: false,
            filter_criteria: None,
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn target_wire_form_uses_all_sentinel() {
        assert_eq!(
            serde_json::to_string(&Target::Broadcast).unwrap(),
            "\"all\""
        );
        assert_eq!(
            serde_json::to_string(&Target::Node("branch-7".into())).unwrap(),
            "\"branch-7\""
        );
        let t: Target = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(t, Target::Broadcast);
        let t: Target = serde_json::from_str("\"regional-1\"").unwrap();
        assert_eq!(t, Target::Node("regional-1".into()));
    }

    #[test]
    fn message_field_names_follow_the_contract() {
        let message = Message {
            id: "m-1".into(),
            source_level: Level::Branch,
            source_id: "branch-1".into(),
            target_level: Level::Regional,
            target: Target::Broadcast,
            message_type: MessageType::DataRequest,
            subject: "data-request:ops".into(),
            content: String::new(),
            metadata: HashMap::new(),
            requires_ack: true,
            priority: 0,
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["sourceLevel"], json!("branch"));
        assert_eq!(value["targetId"], json!("all"));
        assert_eq!(value["type"], json!("data_request"));
        assert_eq!(value["requiresAck"], json!(true));
    }

    #[test]
    fn transfer_round_trips_through_message_content() {
        let mut data = Map::new();
        data.insert("count".into(), json!(5));
        let transfer = DataTransfer::new("ops", Level::Branch, "branch-1", data);
        let content = serde_json::to_string(&transfer).unwrap();
        let parsed: DataTransfer = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.id, transfer.id);
        assert_eq!(parsed.data_type, "ops");
        assert_eq!(parsed.data["count"], json!(5));
        assert!(!parsed.aggregated);
    }
}
