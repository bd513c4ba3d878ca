//! History blob DTOs.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use threadkeep_core::error::ThreadkeepError;
use threadkeep_core::history::{Message, MessageNode, MessageRole, MessageTree};

pub const HISTORY_KEY_PREFIX: &str = "history/";
pub const HISTORY_SCHEMA_VERSION: &str = "1.0.0";

/// Storage key of a thread's history blob.
pub fn history_key(thread_id: &str) -> String {
    format!("{HISTORY_KEY_PREFIX}{thread_id}")
}

fn default_version() -> String {
    HISTORY_SCHEMA_VERSION.to_string()
}

/// A message as stored; `createdAt` stays RFC 3339 text on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDTO {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageNodeDTO {
    pub message: MessageDTO,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// V1.0.0: the whole tree of one thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryBlobV1_0_0 {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub messages: Vec<MessageNodeDTO>,
    #[serde(default)]
    pub head_id: Option<String>,
}

/// The current history blob schema.
pub type HistoryBlobDTO = HistoryBlobV1_0_0;

impl From<&Message> for MessageDTO {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            role: message.role,
            content: message.content.clone(),
            created_at: message
                .created_at
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            metadata: message.metadata.clone(),
        }
    }
}

impl TryFrom<MessageDTO> for Message {
    type Error = ThreadkeepError;

    fn try_from(dto: MessageDTO) -> Result<Self, Self::Error> {
        let created_at = DateTime::parse_from_rfc3339(&dto.created_at)
            .map_err(|e| ThreadkeepError::Serialization {
                format: "JSON".to_string(),
                message: format!("invalid createdAt '{}' on message '{}': {e}", dto.created_at, dto.id),
            })?
            .with_timezone(&Utc);

        Ok(Message {
            id: dto.id,
            role: dto.role,
            content: dto.content,
            created_at,
            metadata: dto.metadata,
        })
    }
}

impl From<&MessageTree> for HistoryBlobV1_0_0 {
    fn from(tree: &MessageTree) -> Self {
        Self {
            version: HISTORY_SCHEMA_VERSION.to_string(),
            messages: tree
                .nodes
                .iter()
                .map(|node| MessageNodeDTO {
                    message: MessageDTO::from(&node.message),
                    parent_id: node.parent_id.clone(),
                })
                .collect(),
            head_id: tree.head_id.clone(),
        }
    }
}

impl TryFrom<HistoryBlobV1_0_0> for MessageTree {
    type Error = ThreadkeepError;

    fn try_from(blob: HistoryBlobV1_0_0) -> Result<Self, Self::Error> {
        if blob.version.split('.').next() != Some("1") {
            return Err(ThreadkeepError::Serialization {
                format: "JSON".to_string(),
                message: format!("unsupported history version '{}'", blob.version),
            });
        }

        let nodes = blob
            .messages
            .into_iter()
            .map(|node| Ok(MessageNode::new(Message::try_from(node.message)?, node.parent_id)))
            .collect::<Result<Vec<_>, ThreadkeepError>>()?;

        Ok(MessageTree {
            nodes,
            head_id: blob.head_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_blob_wire_format() {
        let created_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let mut tree = MessageTree::new();
        tree.append(Message::new("m1", MessageRole::User, "hi").with_created_at(created_at))
            .unwrap();

        let json = serde_json::to_value(HistoryBlobDTO::from(&tree)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "version": "1.0.0",
                "messages": [{
                    "message": {
                        "id": "m1",
                        "role": "user",
                        "content": "hi",
                        "createdAt": "2024-05-01T12:30:00Z"
                    },
                    "parentId": null
                }],
                "headId": "m1"
            })
        );
    }

    #[test]
    fn test_unversioned_blob_is_read_as_1_0_0() {
        let raw = r#"{
            "messages": [{"message": {"id": "m1", "role": "assistant", "content": "x",
                          "createdAt": "2024-05-01T14:30:00+02:00", "metadata": {"model": "m"}}}],
            "headId": "m1"
        }"#;
        let blob: HistoryBlobDTO = serde_json::from_str(raw).unwrap();
        assert_eq!(blob.version, "1.0.0");

        let tree = MessageTree::try_from(blob).unwrap();
        let message = &tree.nodes[0].message;
        assert_eq!(message.role, MessageRole::Assistant);
        assert_eq!(
            message.created_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
        );
        assert_eq!(message.metadata["model"], serde_json::json!("m"));
        assert_eq!(tree.nodes[0].parent_id, None);
    }

    #[test]
    fn test_bad_timestamp_and_version_are_rejected() {
        let blob = HistoryBlobV1_0_0 {
            version: "1.0.0".to_string(),
            messages: vec![MessageNodeDTO {
                message: MessageDTO {
                    id: "m1".to_string(),
                    role: MessageRole::User,
                    content: String::new(),
                    created_at: "yesterday".to_string(),
                    metadata: BTreeMap::new(),
                },
                parent_id: None,
            }],
            head_id: None,
        };
        assert!(MessageTree::try_from(blob).unwrap_err().is_serialization());

        let future = HistoryBlobV1_0_0 {
            version: "2.0.0".to_string(),
            messages: Vec::new(),
            head_id: None,
        };
        assert!(MessageTree::try_from(future).unwrap_err().is_serialization());
    }

    #[test]
    fn test_key_prefix() {
        assert_eq!(history_key("abc"), "history/abc");
    }
}
