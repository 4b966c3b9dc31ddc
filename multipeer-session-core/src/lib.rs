// Domain layer: peer identities, invitations, local identity persistence
pub mod domain;

pub use domain::{
    load_or_mint, truncate_hash, FileIdentityStore, IdentityError, IdentityStore,
    InvitationHandler, InvitationId, InvitationLedger, LedgerError, LocalIdentity,
    MemoryIdentityStore, PeerHandle, PeerId, PeerInfo, PeerRegistry, PendingInvitation,
    SessionState, IDENTITY_KEY,
};
