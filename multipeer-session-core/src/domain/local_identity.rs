use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// Key under which the local peer identity is persisted
pub const IDENTITY_KEY: &str = "local-peer-identity";

/// Persisted identity of the local peer
///
/// The credential is an opaque blob the transport turns into its native
/// handle. A stored identity is only reused while the device display name is
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIdentity {
    pub display_name: String,
    pub credential: Vec<u8>,
}

impl LocalIdentity {
    /// Mint a fresh identity with a random credential
    pub fn mint(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            credential: Uuid::new_v4().as_bytes().to_vec(),
        }
    }

    fn encode(&self) -> Result<Vec<u8>, IdentityError> {
        Ok(serde_json::to_vec(self)?)
    }

    fn decode(bytes: &[u8]) -> Result<Self, IdentityError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Identity encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Invalid identity key: {0}")]
    InvalidKey(String),
}

/// Minimal key-value persistence for the local identity
pub trait IdentityStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, IdentityError>;
    fn store(&self, key: &str, value: &[u8]) -> Result<(), IdentityError>;
}

/// Load the stored identity for `display_name`, or mint and store a new one
///
/// A stored identity that fails to decode or was created under a different
/// display name is replaced.
pub fn load_or_mint(
    store: &dyn IdentityStore,
    display_name: &str,
) -> Result<LocalIdentity, IdentityError> {
    if let Some(bytes) = store.load(IDENTITY_KEY)? {
        match LocalIdentity::decode(&bytes) {
            Ok(identity) if identity.display_name == display_name => {
                tracing::debug!(name = display_name, "Reusing stored local identity");
                return Ok(identity);
            }
            Ok(identity) => {
                tracing::info!(
                    stored = %identity.display_name,
                    current = display_name,
                    "Display name changed, minting new local identity"
                );
            }
            Err(e) => {
                tracing::warn!("Stored local identity is unreadable, minting new one: {}", e);
            }
        }
    }

    let identity = LocalIdentity::mint(display_name);
    store.store(IDENTITY_KEY, &identity.encode()?)?;
    tracing::info!(name = display_name, "Stored new local identity");
    Ok(identity)
}

/// In-memory store, mainly for tests and ephemeral nodes
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, IdentityError> {
        Ok(self.entries().get(key).cloned())
    }

    fn store(&self, key: &str, value: &[u8]) -> Result<(), IdentityError> {
        self.entries().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Directory-backed store: one `<key>.json` file per key
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    dir: PathBuf,
}

impl FileIdentityStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, IdentityError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(IdentityError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, IdentityError> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, key: &str, value: &[u8]) -> Result<(), IdentityError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(path, value)?;
        Ok(())
    }
}
