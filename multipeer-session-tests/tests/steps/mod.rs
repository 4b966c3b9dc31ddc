mod advertising_steps;
mod invitation_steps;
mod peer_registry_steps;
mod session_steps;
