use cucumber::{then, when};
use multipeer_session_core::PeerId;
use multipeer_session_p2p::SessionEvent;
use multipeer_session_tests::CoordinatorWorld;

// ===== When Steps =====

#[when(expr = "{string} sends {string} to {string}")]
async fn send_to(world: &mut CoordinatorWorld, sender: String, message: String, target: String) {
    let id = world
        .known_id(&sender, &target)
        .unwrap_or_else(|| panic!("{} does not know {}", sender, target));
    let result = world
        .coordinator(&sender)
        .send_data_reliable(&[id], message.as_bytes());
    world.last_sent = world.record(result);
}

#[when(expr = "{string} sends {string} to {string} and peer id {int}")]
async fn send_to_with_unknown(
    world: &mut CoordinatorWorld,
    sender: String,
    message: String,
    target: String,
    extra: u32,
) {
    let id = world
        .known_id(&sender, &target)
        .unwrap_or_else(|| panic!("{} does not know {}", sender, target));
    let result = world
        .coordinator(&sender)
        .send_data_reliable(&[id, PeerId::new(extra)], message.as_bytes());
    world.last_sent = world.record(result);
}

#[when(expr = "{string} disconnects")]
async fn disconnect(world: &mut CoordinatorWorld, name: String) {
    world.coordinator(&name).disconnect();
}

#[when(expr = "{string} shuts down")]
async fn shut_down(world: &mut CoordinatorWorld, name: String) {
    world.coordinator(&name).shutdown();
}

// ===== Then Steps =====

#[then(expr = "the send reports {int} bytes")]
async fn send_reports(world: &mut CoordinatorWorld, expected: usize) {
    assert_eq!(world.last_sent, Some(expected));
}

#[then(expr = "{string} received {string} from {string}")]
async fn received(world: &mut CoordinatorWorld, receiver: String, message: String, sender: String) {
    let got = world.log(&receiver).iter().any(|event| {
        matches!(
            event,
            SessionEvent::ReceiveData { peer, data }
                if peer.name == sender && data.as_slice() == message.as_bytes()
        )
    });
    assert!(got, "{} did not receive '{}' from {}", receiver, message, sender);
}

#[then(expr = "{string} received no data")]
async fn received_nothing(world: &mut CoordinatorWorld, receiver: String) {
    let any = world
        .log(&receiver)
        .iter()
        .any(|event| matches!(event, SessionEvent::ReceiveData { .. }));
    assert!(!any);
}

#[then(expr = "{string} is connected to {string}")]
async fn is_connected(world: &mut CoordinatorWorld, name: String, target: String) {
    let connected = world
        .coordinator(&name)
        .connected_peers()
        .iter()
        .any(|peer| peer.name == target);
    assert!(connected, "{} is not connected to {}", name, target);
}

#[then(expr = "{string} has no connected peers")]
async fn no_connected_peers(world: &mut CoordinatorWorld, name: String) {
    assert!(world.coordinator(&name).connected_peers().is_empty());
}

#[then(expr = "{string} lists connected peers {string}")]
async fn lists_connected(world: &mut CoordinatorWorld, name: String, expected: String) {
    let mut names: Vec<String> = world
        .coordinator(&name)
        .connected_peers()
        .into_iter()
        .map(|peer| peer.name)
        .collect();
    names.sort();
    assert_eq!(names.join(", "), expected);
}
