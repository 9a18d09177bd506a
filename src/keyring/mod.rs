//! 签名身份存储的窄接口。密钥材料本身由外部密钥库管理，这里只关心名称、公钥与地址。

use std::fmt;

use parking_lot::RwLock;
use thiserror::Error;

#[derive(Clone, PartialEq, Eq)]
pub struct SigningIdentity {
    pub name: String,
    pub public_key: Vec<u8>,
    pub address: String,
}

impl SigningIdentity {
    pub fn new(name: impl Into<String>, public_key: Vec<u8>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            public_key,
            address: address.into(),
        }
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("public_key", &hex::encode(&self.public_key))
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum KeyringError {
    #[error("密钥 {0} 不存在")]
    NotFound(String),
    #[error("密钥 {0} 已存在")]
    AlreadyExists(String),
    #[error("密钥库后端错误: {0}")]
    Backend(String),
}

pub trait Keyring: Send + Sync {
    /// 按插入顺序列出全部身份，第一个即默认身份。
    fn list_identities(&self) -> Result<Vec<SigningIdentity>, KeyringError>;

    fn get(&self, name: &str) -> Result<SigningIdentity, KeyringError>;

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }
}

/// 内存密钥库，适合测试与嵌入方自行加载密钥的场景。
#[derive(Default)]
pub struct MemoryKeyring {
    identities: RwLock<Vec<SigningIdentity>>,
}

impl MemoryKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identities(identities: impl IntoIterator<Item = SigningIdentity>) -> Self {
        Self {
            identities: RwLock::new(identities.into_iter().collect()),
        }
    }

    pub fn add(&self, identity: SigningIdentity) -> Result<(), KeyringError> {
        let mut guard = self.identities.write();
        if guard.iter().any(|existing| existing.name == identity.name) {
            return Err(KeyringError::AlreadyExists(identity.name));
        }
        guard.push(identity);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<SigningIdentity, KeyringError> {
        let mut guard = self.identities.write();
        let position = guard
            .iter()
            .position(|identity| identity.name == name)
            .ok_or_else(|| KeyringError::NotFound(name.to_string()))?;
        Ok(guard.remove(position))
    }
}

impl Keyring for MemoryKeyring {
    fn list_identities(&self) -> Result<Vec<SigningIdentity>, KeyringError> {
        Ok(self.identities.read().clone())
    }

    fn get(&self, name: &str) -> Result<SigningIdentity, KeyringError> {
        self.identities
            .read()
            .iter()
            .find(|identity| identity.name == name)
            .cloned()
            .ok_or_else(|| KeyringError::NotFound(name.to_string()))
    }
}

/// 选择会话使用的签名身份：优先使用配置的名称，否则回退到第一个身份。
pub fn select_active(
    keyring: &dyn Keyring,
    preferred: &str,
) -> Result<Option<SigningIdentity>, KeyringError> {
    match keyring.get(preferred) {
        Ok(identity) => Ok(Some(identity)),
        Err(KeyringError::NotFound(_)) => Ok(keyring.list_identities()?.into_iter().next()),
        Err(err) => Err(err),
    }
}
