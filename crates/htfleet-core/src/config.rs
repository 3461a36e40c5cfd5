// Engine configuration.

use std::time::Duration;

use url::Url;

use htfleet_api::ReconnectConfig;
use htfleet_api::transport::TransportConfig;

/// Configuration for a [`DeviceManager`](crate::DeviceManager).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Fleet manager root URL, e.g. `http://fleet.local:8080`.
    pub base_url: Url,

    /// HTTP request timeout for the REST surface.
    pub timeout: Duration,

    /// Reconnection policy for the WebSocket link.
    pub reconnect: ReconnectConfig,

    /// Accept self-signed certificates.
    pub accept_invalid_certs: bool,
}

impl ManagerConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
            accept_invalid_certs: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// The transport settings shared by both API surfaces.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }
}
