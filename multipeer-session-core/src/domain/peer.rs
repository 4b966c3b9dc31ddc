use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity object handed out by the transport for a remote or local participant.
///
/// Handles are compared by value equality only. They are not required to be
/// orderable or usable as hash keys, so the registry never indexes them.
pub trait PeerHandle: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Human readable name the peer advertises
    fn display_name(&self) -> &str;

    /// Platform hash of the handle (may be 64 bits wide)
    fn native_hash(&self) -> u64;
}

/// Process-local identifier of a peer, as seen by the calling application
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct PeerId(u32);

impl PeerId {
    /// Reserved id of the local peer. Never assigned to a remote peer.
    pub const LOCAL: PeerId = PeerId(0);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn is_local(&self) -> bool {
        *self == Self::LOCAL
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PeerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Read-only projection of a peer handle, computed on demand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PeerInfo {
    pub id: PeerId,
    pub name: String,
    /// Native hash truncated to 32 bits, comparable across 32/64-bit platforms
    pub hash: u32,
}

impl PeerInfo {
    pub fn new(id: PeerId, handle: &impl PeerHandle) -> Self {
        Self {
            id,
            name: handle.display_name().to_string(),
            hash: truncate_hash(handle.native_hash()),
        }
    }
}

/// Keep the low 32 bits of a native hash
pub fn truncate_hash(hash: u64) -> u32 {
    hash as u32
}

/// Connection state of one remote peer within the local session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum SessionState {
    NotConnected,
    Connecting,
    Connected,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::NotConnected => "NotConnected",
            SessionState::Connecting => "Connecting",
            SessionState::Connected => "Connected",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
