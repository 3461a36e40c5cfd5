// Shared transport configuration for building HTTP clients and deriving
// the WebSocket endpoint from the server base URL.

use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Path of the push-update WebSocket endpoint, relative to the server root.
pub const WS_PATH: &str = "/api/ws";

/// Shared transport settings for both API surfaces.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    /// Accept self-signed certificates. Fleet managers commonly run on a
    /// LAN behind a self-signed cert.
    pub accept_invalid_certs: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("htfleet/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

/// Derive the WebSocket URL from the server base URL.
///
/// Mirrors the page scheme: `https` → `wss`, `http` → `ws`; the path is
/// always [`WS_PATH`].
pub fn websocket_url(base_url: &Url) -> Result<Url, Error> {
    let scheme = match base_url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(Error::UnsupportedScheme(other.to_owned())),
    };

    let host = base_url
        .host_str()
        .ok_or_else(|| Error::UnsupportedScheme("missing host".to_owned()))?;
    let url_str = match base_url.port() {
        Some(p) => format!("{scheme}://{host}:{p}{WS_PATH}"),
        None => format!("{scheme}://{host}{WS_PATH}"),
    };

    Ok(Url::parse(&url_str)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_mirrors_http_scheme() {
        let base = Url::parse("http://fleet.local:8080").unwrap();
        let ws = websocket_url(&base).unwrap();
        assert_eq!(ws.as_str(), "ws://fleet.local:8080/api/ws");
    }

    #[test]
    fn ws_url_mirrors_https_scheme() {
        let base = Url::parse("https://fleet.local").unwrap();
        let ws = websocket_url(&base).unwrap();
        assert_eq!(ws.as_str(), "wss://fleet.local/api/ws");
    }

    #[test]
    fn ws_url_rejects_other_schemes() {
        let base = Url::parse("ftp://fleet.local").unwrap();
        assert!(matches!(
            websocket_url(&base),
            Err(Error::UnsupportedScheme(_))
        ));
    }
}
