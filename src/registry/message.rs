use serde::Serialize;

use super::fallback::FieldMap;

/// 已注册 schema 解出的消息，以 JSON 值呈现。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredMessage {
    pub type_url: String,
    pub value: serde_json::Value,
}

/// 未注册类型的消息，只保留 wire 层面的字段。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnknownMessage {
    pub type_url: String,
    pub fields: FieldMap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodedMessage {
    Known(StructuredMessage),
    Unknown(UnknownMessage),
}

impl DecodedMessage {
    pub fn type_url(&self) -> &str {
        match self {
            DecodedMessage::Known(message) => &message.type_url,
            DecodedMessage::Unknown(message) => &message.type_url,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, DecodedMessage::Known(_))
    }

    pub fn as_known(&self) -> Option<&StructuredMessage> {
        match self {
            DecodedMessage::Known(message) => Some(message),
            DecodedMessage::Unknown(_) => None,
        }
    }

    pub fn as_unknown(&self) -> Option<&UnknownMessage> {
        match self {
            DecodedMessage::Known(_) => None,
            DecodedMessage::Unknown(message) => Some(message),
        }
    }
}
