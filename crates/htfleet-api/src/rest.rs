// REST API HTTP client
//
// Wraps `reqwest::Client` with fleet-manager URL construction and error
// envelope handling. Endpoints are thin: the server returns either the
// payload directly, a single-key wrapper object (`{"status": ...}`,
// `{"profile": ...}`), or an error body `{"error": "..."}` which is
// surfaced verbatim regardless of HTTP status.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::model::{DeviceDiag, DeviceRecord};
use crate::transport::TransportConfig;

/// The server reports failures as `{"error": "..."}`, sometimes with a
/// 200 status.
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<String>,
}

#[derive(Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    profile: String,
}

#[derive(Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: serde_json::Value,
}

#[derive(Deserialize)]
struct VersionsResponse {
    #[serde(default)]
    versions: Vec<String>,
}

/// HTTP client for the fleet manager's REST API.
///
/// One-shot request/response counterpart to the WebSocket link. Used for
/// device actions (reboot, update, delete) and on-demand reads that
/// don't need live push.
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RestClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the manager root, e.g. `http://fleet.local:8080`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The manager base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for an API path: `{base}/api/{path}`
    fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/{path}"))?)
    }

    /// Build a device-scoped URL: `{base}/api/devices/{id}/{path}`
    fn device_url(&self, id: &str, path: &str) -> Result<Url, Error> {
        if path.is_empty() {
            self.api_url(&format!("devices/{id}"))
        } else {
            self.api_url(&format!("devices/{id}/{path}"))
        }
    }

    // ── Devices ──────────────────────────────────────────────────────

    /// List all known devices.
    ///
    /// `GET /api/devices`
    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>, Error> {
        let url = self.api_url("devices")?;
        debug!("listing devices");
        self.get(url).await
    }

    /// Fetch one device's summary record.
    ///
    /// `GET /api/devices/{id}/info`
    pub async fn device_info(&self, id: &str) -> Result<DeviceRecord, Error> {
        let url = self.device_url(id, "info")?;
        debug!(id, "fetching device info");
        self.get(url).await
    }

    /// Fetch one device's diagnostics.
    ///
    /// `GET /api/devices/{id}/diag`
    pub async fn device_diag(&self, id: &str) -> Result<DeviceDiag, Error> {
        let url = self.device_url(id, "diag")?;
        debug!(id, "fetching device diagnostics");
        self.get(url).await
    }

    /// Fetch one device's free-form status line.
    ///
    /// `GET /api/devices/{id}/status`
    pub async fn device_status(&self, id: &str) -> Result<String, Error> {
        let url = self.device_url(id, "status")?;
        debug!(id, "fetching device status");
        let resp: StatusResponse = self.get(url).await?;
        Ok(resp.status)
    }

    // ── Profile ──────────────────────────────────────────────────────

    /// Fetch a device's configuration profile text.
    ///
    /// `GET /api/devices/{id}/profile`
    pub async fn device_profile(&self, id: &str) -> Result<String, Error> {
        let url = self.device_url(id, "profile")?;
        debug!(id, "fetching device profile");
        let resp: ProfileResponse = self.get(url).await?;
        Ok(resp.profile)
    }

    /// Replace a device's configuration profile.
    ///
    /// `POST /api/devices/{id}/profile` with the profile text as the raw
    /// request body.
    pub async fn set_device_profile(&self, id: &str, profile: &str) -> Result<(), Error> {
        let url = self.device_url(id, "profile")?;
        debug!(id, "updating device profile");

        let resp = self
            .http
            .post(url)
            .body(profile.to_owned())
            .send()
            .await
            .map_err(Error::Transport)?;
        check_response(resp).await?;
        Ok(())
    }

    // ── Topics ───────────────────────────────────────────────────────

    /// Fetch the topic tree a device publishes and subscribes to.
    ///
    /// `GET /api/devices/{id}/topics`
    pub async fn device_topics(&self, id: &str) -> Result<serde_json::Value, Error> {
        let url = self.device_url(id, "topics")?;
        debug!(id, "fetching device topics");
        self.get(url).await
    }

    /// Fetch the last published value for each of a device's topics.
    ///
    /// `GET /api/devices/{id}/topics/values`
    pub async fn device_topic_values(&self, id: &str) -> Result<serde_json::Value, Error> {
        let url = self.device_url(id, "topics/values")?;
        debug!(id, "fetching device topic values");
        let resp: ValuesResponse = self.get(url).await?;
        Ok(resp.values)
    }

    // ── Firmware ─────────────────────────────────────────────────────

    /// List firmware versions available for a device.
    ///
    /// `GET /api/devices/{id}/update/versions`
    pub async fn update_versions(&self, id: &str) -> Result<Vec<String>, Error> {
        let url = self.device_url(id, "update/versions")?;
        debug!(id, "fetching available firmware versions");
        let resp: VersionsResponse = self.get(url).await?;
        Ok(resp.versions)
    }

    /// Ask a device to restart.
    ///
    /// `POST /api/devices/{id}/command` with form field `command=restart`
    pub async fn reboot_device(&self, id: &str) -> Result<(), Error> {
        debug!(id, "requesting device restart");
        self.send_command(id, &[("command", "restart")]).await
    }

    /// Ask a device to update its firmware to `version`.
    ///
    /// `POST /api/devices/{id}/command` with form fields
    /// `command=update&version={version}`
    pub async fn update_device(&self, id: &str, version: &str) -> Result<(), Error> {
        debug!(id, version, "requesting firmware update");
        self.send_command(id, &[("command", "update"), ("version", version)])
            .await
    }

    /// Remove a device from the manager's directory.
    ///
    /// `DELETE /api/devices/{id}`
    pub async fn delete_device(&self, id: &str) -> Result<(), Error> {
        let url = self.device_url(id, "")?;
        debug!(id, "deleting device");

        let resp = self.http.delete(url).send().await.map_err(Error::Transport)?;
        check_response(resp).await?;
        Ok(())
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn send_command(&self, id: &str, form: &[(&str, &str)]) -> Result<(), Error> {
        let url = self.device_url(id, "command")?;
        let resp = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(Error::Transport)?;
        check_response(resp).await?;
        Ok(())
    }

    /// Send a GET request and parse the response body.
    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let body = check_response(resp).await?;

        serde_json::from_str(&body).map_err(|e| {
            // Truncate on char boundaries; the body may not be ASCII.
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }
}

/// Common response checks: surface the server's `{"error": "..."}`
/// envelope verbatim when present (regardless of HTTP status), then map
/// 404 and other non-success statuses. Returns the raw body on success.
async fn check_response(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;

    if let Ok(wrapper) = serde_json::from_str::<ErrorEnvelope>(&body) {
        if let Some(message) = wrapper.error {
            return Err(Error::Api { message });
        }
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::NotFound);
    }

    if !status.is_success() {
        return Err(Error::Http {
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}
