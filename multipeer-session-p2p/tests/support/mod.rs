#![allow(dead_code)]

pub mod mock_transport;

use mock_transport::MockTransport;
use multipeer_session_p2p::{CoordinatorConfig, SessionCoordinator};
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_test_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

/// Coordinator wired to a recording mock, plus a handle on the mock
pub struct CoordinatorFixture {
    pub coordinator: Arc<SessionCoordinator<MockTransport>>,
    pub transport: MockTransport,
}

impl CoordinatorFixture {
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::new("Local"))
    }

    pub fn with_config(config: CoordinatorConfig) -> Self {
        init_test_tracing();
        let transport = MockTransport::new();
        let coordinator = SessionCoordinator::new(transport.clone(), config);
        Self {
            coordinator,
            transport,
        }
    }
}
