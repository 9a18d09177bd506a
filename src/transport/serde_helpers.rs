use serde::{Deserialize, Deserializer, de};

/// CometBFT 把 int64 编码成字符串，少数字段又是数字，这里两种都接受。
pub fn u64_from_string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(value)) => Ok(value),
        Some(Raw::Text(text)) if text.trim().is_empty() => Ok(0),
        Some(Raw::Text(text)) => text
            .trim()
            .parse()
            .map_err(|err| de::Error::custom(format!("parse error: {err:?}"))),
        None => Ok(0),
    }
}

pub fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
