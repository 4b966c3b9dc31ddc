use multipeer_session_core::PeerInfo;
use std::fmt;
use std::sync::Arc;

/// Decides whether a certificate chain presented by a connecting peer is trusted
pub trait CertificatePolicy: Send + Sync {
    fn evaluate(&self, peer: &PeerInfo, chain: &[Vec<u8>]) -> bool;
}

/// Default policy: every certificate is accepted
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllCertificates;

impl CertificatePolicy for AcceptAllCertificates {
    fn evaluate(&self, _peer: &PeerInfo, _chain: &[Vec<u8>]) -> bool {
        true
    }
}

impl<F> CertificatePolicy for F
where
    F: Fn(&PeerInfo, &[Vec<u8>]) -> bool + Send + Sync,
{
    fn evaluate(&self, peer: &PeerInfo, chain: &[Vec<u8>]) -> bool {
        self(peer, chain)
    }
}

/// Configuration for a session coordinator
#[derive(Clone)]
pub struct CoordinatorConfig {
    /// Display name the local peer advertises
    pub local_display_name: String,

    /// Policy applied to certificates received during session setup
    pub certificate_policy: Arc<dyn CertificatePolicy>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            local_display_name: "Multipeer Device".to_string(),
            certificate_policy: Arc::new(AcceptAllCertificates),
        }
    }
}

impl CoordinatorConfig {
    pub fn new(local_display_name: impl Into<String>) -> Self {
        Self {
            local_display_name: local_display_name.into(),
            ..Default::default()
        }
    }

    pub fn with_certificate_policy(mut self, policy: impl CertificatePolicy + 'static) -> Self {
        self.certificate_policy = Arc::new(policy);
        self
    }
}

impl fmt::Debug for CoordinatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinatorConfig")
            .field("local_display_name", &self.local_display_name)
            .finish_non_exhaustive()
    }
}
