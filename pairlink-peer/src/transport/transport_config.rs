use pairlink_core::IceServerConfig;

/// WebRTC settings shared by every transport a session creates.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
    /// Gather loopback host candidates. Only useful when both endpoints
    /// run on the same machine (tests, local demos).
    pub include_loopback_candidates: bool,
}

impl TransportConfig {
    /// Host-only configuration for two endpoints on the same machine.
    pub fn loopback() -> Self {
        Self {
            ice_servers: Vec::new(),
            include_loopback_candidates: true,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::stun("stun:stun.l.google.com:19302")],
            include_loopback_candidates: false,
        }
    }
}
