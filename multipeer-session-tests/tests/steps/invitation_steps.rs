use cucumber::{given, then, when};
use multipeer_session_core::PeerId;
use multipeer_session_p2p::SessionEvent;
use multipeer_session_tests::CoordinatorWorld;

// ===== When Steps =====

#[given(expr = "{string} invites {string}")]
#[when(expr = "{string} invites {string}")]
async fn invite(world: &mut CoordinatorWorld, inviter: String, invitee: String) {
    let id = world
        .known_id(&inviter, &invitee)
        .unwrap_or_else(|| panic!("{} has not discovered {}", inviter, invitee));
    let result = world.coordinator(&inviter).invite_peer(id);
    world.record(result);
}

#[when(expr = "{string} invites peer id {int}")]
async fn invite_by_id(world: &mut CoordinatorWorld, inviter: String, id: u32) {
    let result = world.coordinator(&inviter).invite_peer(PeerId::new(id));
    world.record(result);
}

#[given(expr = "{string} accepts the last invitation")]
#[when(expr = "{string} accepts the last invitation")]
async fn accept_last(world: &mut CoordinatorWorld, name: String) {
    let invitation = world
        .last_invitation(&name)
        .unwrap_or_else(|| panic!("{} received no invitation", name));
    let result = world.coordinator(&name).accept_invitation(invitation);
    world.record(result);
}

#[when(expr = "{string} declines the last invitation")]
async fn decline_last(world: &mut CoordinatorWorld, name: String) {
    let invitation = world
        .last_invitation(&name)
        .unwrap_or_else(|| panic!("{} received no invitation", name));
    let result = world.coordinator(&name).decline_invitation(invitation);
    world.record(result);
}

// ===== Then Steps =====

#[then(expr = "{string} has {int} pending invitations")]
async fn pending_invitations(world: &mut CoordinatorWorld, name: String, expected: usize) {
    assert_eq!(world.coordinator(&name).pending_invitations(), expected);
}

#[then(expr = "{string} saw {string} change to {string}")]
async fn saw_state(world: &mut CoordinatorWorld, observer: String, target: String, state: String) {
    let seen = world.log(&observer).iter().any(|event| match event {
        SessionEvent::ChangeState { peer, state: s } => {
            peer.name == target && s.as_str() == state
        }
        _ => false,
    });
    assert!(seen, "{} never saw {} become {}", observer, target, state);
}
