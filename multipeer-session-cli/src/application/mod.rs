pub mod bridge;
pub mod demo;
pub mod echo;
pub mod protocol;

pub use bridge::{serve, CommandDispatcher};
pub use demo::run_demo;
pub use echo::EchoPeer;
pub use protocol::{Command, ErrorPayload, Payload, PeerSelection, Request, Response, Status};
