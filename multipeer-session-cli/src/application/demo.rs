use crate::application::echo::EchoPeer;
use crate::application::protocol::event_payload;
use crate::infrastructure::{CliError, Result};
use multipeer_session_p2p::{
    EventCategory, LoopbackNetwork, LoopbackTransport, SessionCoordinator, SessionEvent,
    SessionState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Walk one coordinator through discover, invite, exchange and disconnect
/// against an echo peer on the same loopback network
pub async fn run_demo(
    network: &LoopbackNetwork,
    coordinator: Arc<SessionCoordinator<LoopbackTransport>>,
    service_type: &str,
    message: &str,
) -> Result<Vec<u8>> {
    let (tx, mut events) = mpsc::unbounded_channel();
    for category in EventCategory::ALL {
        coordinator.arm(category, tx.clone());
    }
    drop(tx);

    let _echo = EchoPeer::spawn(network, "Echo", service_type)?;

    let local = coordinator.local_peer_info();
    tracing::info!(name = %local.name, id = %local.id, "Local peer ready");

    coordinator.start_browsing(service_type)?;
    let echo_id = wait_for(&mut events, "echo peer discovery", |event| match event {
        SessionEvent::FoundPeer(peer) => Some(peer.id),
        _ => None,
    })
    .await?;
    tracing::info!(peer_id = %echo_id, "Found echo peer, inviting");

    coordinator.invite_peer(echo_id)?;
    wait_for(&mut events, "session connection", |event| match event {
        SessionEvent::ChangeState {
            peer,
            state: SessionState::Connected,
        } if peer.id == echo_id => Some(()),
        _ => None,
    })
    .await?;
    tracing::info!(connected = coordinator.connected_peers().len(), "Session established");

    let sent = coordinator.send_data_reliable(&[echo_id], message.as_bytes())?;
    tracing::info!(bytes = sent, "Message sent");

    let echoed = wait_for(&mut events, "echo", |event| match event {
        SessionEvent::ReceiveData { peer, data } if peer.id == echo_id => Some(data.clone()),
        _ => None,
    })
    .await?;
    tracing::info!(reply = %String::from_utf8_lossy(&echoed), "Echo received");

    coordinator.disconnect();
    coordinator.shutdown();
    Ok(echoed)
}

/// Log events until `select` picks one, or give up after a few seconds
async fn wait_for<R>(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    what: &str,
    select: impl Fn(&SessionEvent) -> Option<R>,
) -> Result<R> {
    let waiting = async {
        while let Some(event) = events.recv().await {
            tracing::info!(category = %event.category(), payload = %event_payload(&event), "Event");
            if let Some(found) = select(&event) {
                return Some(found);
            }
        }
        None
    };

    match tokio::time::timeout(STEP_TIMEOUT, waiting).await {
        Ok(Some(found)) => Ok(found),
        Ok(None) => Err(CliError::Protocol(format!(
            "event stream closed while waiting for {what}"
        ))),
        Err(_) => Err(CliError::Timeout(what.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multipeer_session_p2p::CoordinatorConfig;

    #[tokio::test]
    async fn test_demo_round_trip() {
        let network = LoopbackNetwork::new();
        let coordinator = SessionCoordinator::new(network.join(), CoordinatorConfig::new("Demo"));

        let echoed = run_demo(&network, coordinator.clone(), "demo", "hello")
            .await
            .unwrap();

        assert_eq!(echoed, b"hello".to_vec());
        assert!(!coordinator.is_browsing());
        assert!(coordinator.connected_peers().is_empty());
    }

    #[tokio::test]
    async fn test_demo_rejects_bad_service_type() {
        let network = LoopbackNetwork::new();
        let coordinator = SessionCoordinator::new(network.join(), CoordinatorConfig::new("Demo"));

        let result = run_demo(&network, coordinator, "Bad Type", "hello").await;

        assert!(matches!(result, Err(CliError::Session(_))));
    }
}
