use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a pending inbound invitation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct InvitationId(u64);

impl InvitationId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InvitationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One-shot continuation supplied by the transport with an inbound invitation
///
/// Called with `true` to join the inviter into the local session, `false` to decline.
pub type InvitationHandler = Box<dyn FnOnce(bool) + Send + 'static>;

/// An invitation taken out of the ledger, ready to be answered exactly once
pub struct PendingInvitation {
    id: InvitationId,
    handler: InvitationHandler,
}

impl PendingInvitation {
    pub fn new(id: InvitationId, handler: InvitationHandler) -> Self {
        Self { id, handler }
    }

    pub fn id(&self) -> InvitationId {
        self.id
    }

    /// Invoke the continuation. Consumes the invitation.
    pub fn respond(self, accept: bool) {
        tracing::debug!(invitation_id = %self.id, accept, "Answering invitation");
        (self.handler)(accept)
    }

    /// Give up the bookkeeping and hand back the bare continuation
    pub fn into_handler(self) -> InvitationHandler {
        self.handler
    }
}

impl fmt::Debug for PendingInvitation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingInvitation")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The id was never issued or has already been answered
    #[error("Invitation not found: {0}")]
    NotFound(InvitationId),
}

/// Arena of inbound invitations waiting for an accept/decline decision
///
/// Entries are removed the moment they are answered. An entry that is never
/// answered stays until the ledger is dropped.
#[derive(Default)]
pub struct InvitationLedger {
    pending: HashMap<InvitationId, InvitationHandler>,
    next_id: u64,
}

impl InvitationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a continuation under a freshly allocated id
    pub fn record(&mut self, handler: InvitationHandler) -> InvitationId {
        let id = InvitationId::new(self.next_id);
        self.next_id += 1;
        self.pending.insert(id, handler);
        id
    }

    /// Remove an entry without invoking it
    ///
    /// Callers holding a lock should take the invitation out, release the lock
    /// and only then call [`PendingInvitation::respond`].
    pub fn take(&mut self, id: InvitationId) -> Option<PendingInvitation> {
        self.pending
            .remove(&id)
            .map(|handler| PendingInvitation::new(id, handler))
    }

    /// Remove the entry and invoke its continuation with `accept`
    pub fn resolve(&mut self, id: InvitationId, accept: bool) -> Result<(), LedgerError> {
        let invitation = self.take(id).ok_or(LedgerError::NotFound(id))?;
        invitation.respond(accept);
        Ok(())
    }

    pub fn contains(&self, id: InvitationId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl fmt::Debug for InvitationLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.pending.keys().copied().collect();
        ids.sort();
        f.debug_struct("InvitationLedger")
            .field("pending", &ids)
            .field("next_id", &self.next_id)
            .finish()
    }
}
