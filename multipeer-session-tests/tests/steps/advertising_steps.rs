use cucumber::{given, then, when};
use multipeer_session_p2p::SessionEvent;
use multipeer_session_tests::CoordinatorWorld;

// ===== Given Steps =====

#[given(expr = "a peer {string} on the network")]
async fn peer_on_network(world: &mut CoordinatorWorld, name: String) {
    world.add_node(&name, true);
}

#[given(expr = "a peer {string} on the network that ignores invitations")]
async fn peer_ignoring_invitations(world: &mut CoordinatorWorld, name: String) {
    world.add_node(&name, false);
}

// ===== When Steps =====

#[given(expr = "{string} advertises {string}")]
#[when(expr = "{string} advertises {string}")]
async fn advertise(world: &mut CoordinatorWorld, name: String, service_type: String) {
    let result = world.coordinator(&name).start_advertising(&service_type);
    world.record(result);
}

#[given(expr = "{string} browses {string}")]
#[when(expr = "{string} browses {string}")]
async fn browse(world: &mut CoordinatorWorld, name: String, service_type: String) {
    let result = world.coordinator(&name).start_browsing(&service_type);
    world.record(result);
}

#[when(expr = "{string} stops advertising")]
async fn stop_advertising(world: &mut CoordinatorWorld, name: String) {
    world.coordinator(&name).stop_advertising();
}

// ===== Then Steps =====

#[then(expr = "{string} is advertising")]
async fn is_advertising(world: &mut CoordinatorWorld, name: String) {
    assert!(world.coordinator(&name).is_advertising());
}

#[then(expr = "{string} is not advertising")]
async fn is_not_advertising(world: &mut CoordinatorWorld, name: String) {
    assert!(!world.coordinator(&name).is_advertising());
}

#[then(expr = "{string} is browsing")]
async fn is_browsing(world: &mut CoordinatorWorld, name: String) {
    assert!(world.coordinator(&name).is_browsing());
}

#[then(expr = "{string} is not browsing")]
async fn is_not_browsing(world: &mut CoordinatorWorld, name: String) {
    assert!(!world.coordinator(&name).is_browsing());
}

#[then(expr = "{string} has lost {string}")]
async fn has_lost(world: &mut CoordinatorWorld, observer: String, target: String) {
    let lost = world.log(&observer).iter().any(|event| {
        matches!(event, SessionEvent::LostPeer(peer) if peer.name == target)
    });
    assert!(lost, "{} did not lose {}", observer, target);
}

#[then(expr = "the operation fails with {string}")]
async fn operation_fails(world: &mut CoordinatorWorld, kind: String) {
    let error = world
        .last_error
        .as_ref()
        .expect("Expected the last operation to fail");
    assert_eq!(error.kind().to_string(), kind, "unexpected error: {}", error);
}
