use crate::infrastructure::Result;
use multipeer_session_p2p::{
    CoordinatorConfig, EventCategory, LoopbackNetwork, LoopbackTransport, SessionCoordinator,
    SessionEvent,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A loopback node that accepts every invitation and sends received data back
pub struct EchoPeer {
    coordinator: Arc<SessionCoordinator<LoopbackTransport>>,
    task: JoinHandle<()>,
}

impl EchoPeer {
    /// Join `network` as `name` and advertise under `service_type`
    pub fn spawn(network: &LoopbackNetwork, name: &str, service_type: &str) -> Result<Self> {
        let coordinator = SessionCoordinator::new(network.join(), CoordinatorConfig::new(name));
        let mut invitations = coordinator.subscribe(EventCategory::ReceiveInvitation);
        let mut data = coordinator.subscribe(EventCategory::ReceiveData);
        coordinator.start_advertising(service_type)?;
        tracing::info!(name, service_type, "Echo peer advertising");

        let worker = coordinator.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(event) = invitations.recv() => {
                        if let SessionEvent::ReceiveInvitation { peer, invitation_id } = event {
                            tracing::debug!(from = %peer.name, "Echo peer accepting invitation");
                            if let Err(e) = worker.accept_invitation(invitation_id) {
                                tracing::warn!("Echo peer could not accept: {}", e);
                            }
                        }
                    }
                    Some(event) = data.recv() => {
                        if let SessionEvent::ReceiveData { peer, data } = event {
                            if let Err(e) = worker.send_data_reliable(&[peer.id], &data) {
                                tracing::warn!(to = %peer.name, "Echo failed: {}", e);
                            }
                        }
                    }
                    else => break,
                }
            }
        });

        Ok(Self { coordinator, task })
    }

    pub fn coordinator(&self) -> &Arc<SessionCoordinator<LoopbackTransport>> {
        &self.coordinator
    }
}

impl Drop for EchoPeer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
