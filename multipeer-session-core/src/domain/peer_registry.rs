use crate::domain::{PeerHandle, PeerId, PeerInfo};

/// Maps opaque transport handles to stable small-integer peer ids
///
/// The local handle always maps to [`PeerId::LOCAL`]. Remote handles get ids
/// from 1 upwards in first-seen order. Mappings are never removed, so an id
/// is never reused for the lifetime of the registry.
///
/// Lookup is a linear equality scan: handles only promise value equality and
/// peer counts stay in the tens.
#[derive(Debug, Clone)]
pub struct PeerRegistry<H: PeerHandle> {
    local: H,
    /// Association list in allocation order
    known: Vec<(PeerId, H)>,
    next_id: u32,
}

impl<H: PeerHandle> PeerRegistry<H> {
    /// Create a registry anchored on the local peer's handle
    pub fn new(local: H) -> Self {
        Self {
            local,
            known: Vec::new(),
            next_id: 1,
        }
    }

    /// Look up the id of `handle`, assigning the next free id on first sight
    ///
    /// This is the only place where remote peer ids are minted.
    pub fn resolve(&mut self, handle: &H) -> PeerId {
        if *handle == self.local {
            return PeerId::LOCAL;
        }

        if let Some(id) = self.find(handle) {
            return id;
        }

        let id = PeerId::new(self.next_id);
        self.next_id += 1;
        self.known.push((id, handle.clone()));

        tracing::debug!(peer_id = %id, name = handle.display_name(), "Registered new peer");
        id
    }

    /// Look up the id of `handle` without registering it
    pub fn find(&self, handle: &H) -> Option<PeerId> {
        if *handle == self.local {
            return Some(PeerId::LOCAL);
        }
        self.known
            .iter()
            .find(|(_, known)| known == handle)
            .map(|(id, _)| *id)
    }

    /// Get the handle registered under `id`
    pub fn handle(&self, id: PeerId) -> Option<&H> {
        if id.is_local() {
            return Some(&self.local);
        }
        self.known
            .iter()
            .find(|(known_id, _)| *known_id == id)
            .map(|(_, handle)| handle)
    }

    /// Get the handle of a remote peer (never the local one)
    pub fn remote_handle(&self, id: PeerId) -> Option<&H> {
        if id.is_local() {
            return None;
        }
        self.handle(id)
    }

    /// Resolve `handle` and project it into a [`PeerInfo`]
    pub fn info(&mut self, handle: &H) -> PeerInfo {
        let id = self.resolve(handle);
        PeerInfo::new(id, handle)
    }

    /// Info for the local peer (always id 0)
    pub fn local_info(&self) -> PeerInfo {
        PeerInfo::new(PeerId::LOCAL, &self.local)
    }

    pub fn local(&self) -> &H {
        &self.local
    }

    /// Number of registered remote peers
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// All registered remote peers in allocation order
    pub fn peers(&self) -> impl Iterator<Item = (PeerId, &H)> {
        self.known.iter().map(|(id, handle)| (*id, handle))
    }
}
