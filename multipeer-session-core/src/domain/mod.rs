mod invitation_ledger;
mod local_identity;
mod peer;
mod peer_registry;

pub use invitation_ledger::{
    InvitationHandler, InvitationId, InvitationLedger, LedgerError, PendingInvitation,
};
pub use local_identity::{
    load_or_mint, FileIdentityStore, IdentityError, IdentityStore, LocalIdentity,
    MemoryIdentityStore, IDENTITY_KEY,
};
pub use peer::{truncate_hash, PeerHandle, PeerId, PeerInfo, SessionState};
pub use peer_registry::PeerRegistry;
