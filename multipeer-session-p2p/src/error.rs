use multipeer_session_core::{IdentityError, InvitationId, PeerId};
use std::fmt;

/// Errors returned by coordinator operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("Transport initialization failed: {0}")]
    TransportInit(String),

    #[error("{0}")]
    TransportSend(String),

    #[error("Invalid peer ids")]
    InvalidPeerIds,

    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),

    #[error("Not browsing for peers")]
    NotBrowsing,

    #[error("Unknown invitation: {0}")]
    UnknownInvitation(InvitationId),

    #[error("Local identity error: {0}")]
    Identity(#[from] IdentityError),
}

/// Caller-facing classification of a [`SessionError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Empty or malformed arguments, rejected before touching the transport
    Validation,
    /// Advertiser or browser could not be constructed
    TransportInit,
    /// The transport refused to send
    TransportSend,
    /// Unknown peer id or invitation id
    InvalidReference,
    /// The local identity could not be loaded or stored
    Storage,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Validation(_) | SessionError::NotBrowsing => ErrorKind::Validation,
            SessionError::TransportInit(_) => ErrorKind::TransportInit,
            SessionError::TransportSend(_) => ErrorKind::TransportSend,
            SessionError::InvalidPeerIds
            | SessionError::UnknownPeer(_)
            | SessionError::UnknownInvitation(_) => ErrorKind::InvalidReference,
            SessionError::Identity(_) => ErrorKind::Storage,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "Validation",
            ErrorKind::TransportInit => "TransportInit",
            ErrorKind::TransportSend => "TransportSend",
            ErrorKind::InvalidReference => "InvalidReference",
            ErrorKind::Storage => "Storage",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
