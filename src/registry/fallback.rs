use std::collections::BTreeMap;

use bytes::{Buf, BufMut};
use prost::encoding::{WireType, decode_key, decode_varint, encode_key, encode_varint};
use serde::{Deserialize, Serialize};

use super::SchemaError;

/// 未知 schema 的 protobuf 字段值，只保留 wire 层面的信息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Varint(u64),
    Fixed64(u64),
    Fixed32(u32),
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
}

/// 字段号 -> 按出现顺序排列的值。
///
/// 任何合法的 protobuf 消息都能解析成 `FieldMap`；它的 JSON 形式可以原样解析回来，
/// 按字段号升序编码的输入重新编码后与原始字节一致。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<u32, Vec<FieldValue>>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: u32, value: FieldValue) {
        self.0.entry(field).or_default().push(value);
    }

    pub fn get(&self, field: u32) -> Option<&[FieldValue]> {
        self.0.get(&field).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[FieldValue])> {
        self.0.iter().map(|(field, values)| (*field, values.as_slice()))
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, SchemaError> {
        let mut fields = Self::new();
        while buf.has_remaining() {
            let (field, wire_type) = decode_key(&mut buf)?;
            let value = match wire_type {
                WireType::Varint => FieldValue::Varint(decode_varint(&mut buf)?),
                WireType::SixtyFourBit => {
                    ensure_remaining(buf, 8, field)?;
                    FieldValue::Fixed64(buf.get_u64_le())
                }
                WireType::ThirtyTwoBit => {
                    ensure_remaining(buf, 4, field)?;
                    FieldValue::Fixed32(buf.get_u32_le())
                }
                WireType::LengthDelimited => {
                    let len = usize::try_from(decode_varint(&mut buf)?).map_err(|_| {
                        SchemaError::malformed(format!("field {field}: length overflows usize"))
                    })?;
                    ensure_remaining(buf, len, field)?;
                    let bytes = buf[..len].to_vec();
                    buf.advance(len);
                    FieldValue::Bytes(bytes)
                }
                WireType::StartGroup | WireType::EndGroup => {
                    return Err(SchemaError::malformed(format!(
                        "field {field}: group encoding is not supported"
                    )));
                }
            };
            fields.insert(field, value);
        }
        Ok(fields)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for (field, values) in &self.0 {
            for value in values {
                match value {
                    FieldValue::Varint(v) => {
                        encode_key(*field, WireType::Varint, &mut buf);
                        encode_varint(*v, &mut buf);
                    }
                    FieldValue::Fixed64(v) => {
                        encode_key(*field, WireType::SixtyFourBit, &mut buf);
                        buf.put_u64_le(*v);
                    }
                    FieldValue::Fixed32(v) => {
                        encode_key(*field, WireType::ThirtyTwoBit, &mut buf);
                        buf.put_u32_le(*v);
                    }
                    FieldValue::Bytes(bytes) => {
                        encode_key(*field, WireType::LengthDelimited, &mut buf);
                        encode_varint(bytes.len() as u64, &mut buf);
                        buf.put_slice(bytes);
                    }
                }
            }
        }
        buf
    }

    pub fn to_canonical_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_canonical_json(text: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(text)?)
    }
}

fn ensure_remaining(buf: &[u8], needed: usize, field: u32) -> Result<(), SchemaError> {
    if buf.remaining() < needed {
        return Err(SchemaError::malformed(format!(
            "field {field}: need {needed} bytes, {} left",
            buf.remaining()
        )));
    }
    Ok(())
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        STANDARD
            .decode(raw.as_bytes())
            .map_err(|err| de::Error::custom(format!("invalid base64: {err}")))
    }
}
