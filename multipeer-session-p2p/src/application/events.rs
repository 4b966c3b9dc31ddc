use multipeer_session_core::{InvitationId, PeerInfo, SessionState};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The notification channels a consumer can subscribe to, one endpoint each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum EventCategory {
    AdvertisingError,
    BrowsingError,
    FoundPeer,
    LostPeer,
    ReceiveInvitation,
    ReceiveData,
    ChangeState,
}

impl EventCategory {
    pub const ALL: [EventCategory; 7] = [
        EventCategory::AdvertisingError,
        EventCategory::BrowsingError,
        EventCategory::FoundPeer,
        EventCategory::LostPeer,
        EventCategory::ReceiveInvitation,
        EventCategory::ReceiveData,
        EventCategory::ChangeState,
    ];
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Events pushed to the consumer, already enriched with stable peer ids
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The advertiser failed to start
    AdvertisingError(String),
    /// The browser failed to start
    BrowsingError(String),
    FoundPeer(PeerInfo),
    LostPeer(PeerInfo),
    /// A peer asks to join; answer with accept/decline using `invitation_id`
    ReceiveInvitation {
        peer: PeerInfo,
        invitation_id: InvitationId,
    },
    ReceiveData {
        peer: PeerInfo,
        data: Vec<u8>,
    },
    ChangeState {
        peer: PeerInfo,
        state: SessionState,
    },
}

impl SessionEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            SessionEvent::AdvertisingError(_) => EventCategory::AdvertisingError,
            SessionEvent::BrowsingError(_) => EventCategory::BrowsingError,
            SessionEvent::FoundPeer(_) => EventCategory::FoundPeer,
            SessionEvent::LostPeer(_) => EventCategory::LostPeer,
            SessionEvent::ReceiveInvitation { .. } => EventCategory::ReceiveInvitation,
            SessionEvent::ReceiveData { .. } => EventCategory::ReceiveData,
            SessionEvent::ChangeState { .. } => EventCategory::ChangeState,
        }
    }

    /// The peer the event is about, if any
    pub fn peer(&self) -> Option<&PeerInfo> {
        match self {
            SessionEvent::AdvertisingError(_) | SessionEvent::BrowsingError(_) => None,
            SessionEvent::FoundPeer(peer) | SessionEvent::LostPeer(peer) => Some(peer),
            SessionEvent::ReceiveInvitation { peer, .. }
            | SessionEvent::ReceiveData { peer, .. }
            | SessionEvent::ChangeState { peer, .. } => Some(peer),
        }
    }
}
