pub mod application;
pub mod infrastructure;

pub use application::{CommandDispatcher, EchoPeer, Request, Response};
pub use infrastructure::{CliError, LogConfig, Result};
