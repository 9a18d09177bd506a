//! type URL -> 消息 schema 的解析。未注册的类型退化为通用的字段表示，而不是解码失败。

mod fallback;
mod message;

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use ibc_proto::cosmos::bank::v1beta1::{MsgMultiSend, MsgSend};
use parking_lot::RwLock;
use prost::Message;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{CompassError, CompassResult};

pub use fallback::{FieldMap, FieldValue};
pub use message::{DecodedMessage, StructuredMessage, UnknownMessage};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("protobuf 解码失败: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("消息格式错误: {0}")]
    Malformed(String),
    #[error("JSON 转换失败: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    pub fn malformed(reason: impl fmt::Display) -> Self {
        Self::Malformed(reason.to_string())
    }
}

/// 已知消息类型的解码器。
pub trait MessageSchema: Send + Sync {
    fn type_url(&self) -> &str;

    fn decode(&self, bytes: &[u8]) -> Result<serde_json::Value, SchemaError>;
}

/// 任意 `prost::Message + Serialize` 类型的 schema 适配。
pub struct ProtoSchema<M> {
    type_url: String,
    _marker: PhantomData<fn() -> M>,
}

impl<M> ProtoSchema<M>
where
    M: Message + Default + Serialize + 'static,
{
    pub fn new(type_url: impl Into<String>) -> Self {
        Self {
            type_url: type_url.into(),
            _marker: PhantomData,
        }
    }

    pub fn shared(type_url: impl Into<String>) -> Arc<dyn MessageSchema> {
        Arc::new(Self::new(type_url))
    }
}

impl<M> MessageSchema for ProtoSchema<M>
where
    M: Message + Default + Serialize + 'static,
{
    fn type_url(&self) -> &str {
        &self.type_url
    }

    fn decode(&self, bytes: &[u8]) -> Result<serde_json::Value, SchemaError> {
        let message = M::decode(bytes)?;
        Ok(serde_json::to_value(&message)?)
    }
}

/// `resolve` 的结果：已注册的 schema 或通用回退。
#[derive(Clone)]
pub enum Decodable {
    Known(Arc<dyn MessageSchema>),
    Fallback { type_url: String },
}

impl Decodable {
    pub fn type_url(&self) -> &str {
        match self {
            Decodable::Known(schema) => schema.type_url(),
            Decodable::Fallback { type_url } => type_url,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Decodable::Known(_))
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedMessage, SchemaError> {
        match self {
            Decodable::Known(schema) => Ok(DecodedMessage::Known(StructuredMessage {
                type_url: schema.type_url().to_string(),
                value: schema.decode(bytes)?,
            })),
            Decodable::Fallback { type_url } => Ok(DecodedMessage::Unknown(UnknownMessage {
                type_url: type_url.clone(),
                fields: FieldMap::decode(bytes)?,
            })),
        }
    }

    /// 同一 type URL 的通用回退。
    pub fn fallback(&self) -> Decodable {
        Decodable::Fallback {
            type_url: self.type_url().to_string(),
        }
    }
}

impl fmt::Debug for Decodable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decodable::Known(schema) => f.debug_tuple("Known").field(&schema.type_url()).finish(),
            Decodable::Fallback { type_url } => {
                f.debug_struct("Fallback").field("type_url", type_url).finish()
            }
        }
    }
}

/// 启动时填充、运行期只增不减的 schema 表。
#[derive(Default)]
pub struct TypeRegistry {
    schemas: RwLock<HashMap<String, Arc<dyn MessageSchema>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: impl IntoIterator<Item = Arc<dyn MessageSchema>>) -> CompassResult<Self> {
        let registry = Self::new();
        for schema in seed {
            registry.register(schema)?;
        }
        Ok(registry)
    }

    /// 注册 schema；type URL 已存在时保留先注册的并返回 `false`。
    pub fn register(&self, schema: Arc<dyn MessageSchema>) -> CompassResult<bool> {
        let type_url = schema.type_url().to_string();
        if type_url.len() < 2 || !type_url.starts_with('/') {
            return Err(CompassError::invariant(format!(
                "schema type url `{type_url}` must start with '/'"
            )));
        }

        let mut schemas = self.schemas.write();
        if schemas.contains_key(&type_url) {
            warn!(
                target: "compass::registry",
                type_url = %type_url,
                "schema already registered, keeping the first one"
            );
            return Ok(false);
        }
        schemas.insert(type_url.clone(), schema);
        debug!(target: "compass::registry", type_url = %type_url, "schema registered");
        Ok(true)
    }

    pub fn resolve(&self, type_url: &str) -> Decodable {
        match self.schemas.read().get(type_url) {
            Some(schema) => Decodable::Known(schema.clone()),
            None => {
                debug!(
                    target: "compass::registry",
                    type_url,
                    "unregistered type url, using generic representation"
                );
                Decodable::Fallback {
                    type_url: type_url.to_string(),
                }
            }
        }
    }

    pub fn contains(&self, type_url: &str) -> bool {
        self.schemas.read().contains_key(type_url)
    }

    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }

    pub fn type_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.schemas.read().keys().cloned().collect();
        urls.sort();
        urls
    }
}

/// bank 模块的转账消息。
pub fn default_seed() -> Vec<Arc<dyn MessageSchema>> {
    vec![
        ProtoSchema::<MsgSend>::shared("/cosmos.bank.v1beta1.MsgSend"),
        ProtoSchema::<MsgMultiSend>::shared("/cosmos.bank.v1beta1.MsgMultiSend"),
    ]
}
