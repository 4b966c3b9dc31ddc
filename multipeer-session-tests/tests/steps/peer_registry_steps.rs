use cucumber::{given, then, when};
use multipeer_session_core::PeerId;
use multipeer_session_p2p::SessionEvent;
use multipeer_session_tests::{CoordinatorWorld, TestHandle};
use std::collections::HashSet;

// ===== Given Steps =====

#[given("a fresh peer registry")]
async fn fresh_registry(world: &mut CoordinatorWorld) {
    world.registry = None;
    world.resolved.clear();
    assert!(world.registry().is_empty());
}

// ===== When Steps =====

#[when("I resolve the local peer")]
async fn resolve_local(world: &mut CoordinatorWorld) {
    let local = world.registry().local().clone();
    let id = world.registry().resolve(&local);
    world.resolved.push((local.name, id));
}

#[when(expr = "I resolve peer {string}")]
async fn resolve_peer(world: &mut CoordinatorWorld, name: String) {
    let id = world.registry().resolve(&TestHandle::named(&name));
    world.resolved.push((name, id));
}

// ===== Then Steps =====

#[then(expr = "the last resolved id is {int}")]
async fn last_resolved_id(world: &mut CoordinatorWorld, expected: u32) {
    let (_, id) = world.resolved.last().expect("nothing resolved yet");
    assert_eq!(*id, PeerId::new(expected));
}

#[then(expr = "the resolved ids are {string}")]
async fn resolved_ids(world: &mut CoordinatorWorld, expected: String) {
    let actual: Vec<String> = world
        .resolved
        .iter()
        .map(|(_, id)| id.to_string())
        .collect();
    assert_eq!(actual.join(", "), expected);
}

#[then(expr = "the registry knows {int} remote peers")]
async fn registry_size(world: &mut CoordinatorWorld, expected: usize) {
    assert_eq!(world.registry().len(), expected);
}

#[then(expr = "{string} has found {int} peers")]
async fn found_count(world: &mut CoordinatorWorld, observer: String, expected: usize) {
    let found: HashSet<PeerId> = world
        .log(&observer)
        .iter()
        .filter_map(|event| match event {
            SessionEvent::FoundPeer(peer) => Some(peer.id),
            _ => None,
        })
        .collect();
    assert_eq!(found.len(), expected);
}

#[then(expr = "{string} knows {string} as a non-local peer")]
async fn knows_peer(world: &mut CoordinatorWorld, observer: String, target: String) {
    let id = world
        .known_id(&observer, &target)
        .unwrap_or_else(|| panic!("{} never heard of {}", observer, target));
    assert!(!id.is_local());
}

#[then(expr = "{string} never sees itself")]
async fn never_sees_itself(world: &mut CoordinatorWorld, name: String) {
    assert!(world.known_id(&name, &name).is_none());
    assert_eq!(world.coordinator(&name).local_peer_info().id, PeerId::LOCAL);
}
