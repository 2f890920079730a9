use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::session::SessionInfo;
use crate::client::DeviceClient;
use crate::device::{Device, DeviceStatus};

/// Identifies this client to the login endpoints.
const CORP_ID: &str = "1007d2ad150c4000";

/// Two-step login: request a code by mail, then trade it for a session.
#[derive(Debug, Clone)]
pub struct Authenticator {
    base_url: String,
    client: Client,
}

#[derive(Serialize, Debug)]
struct CodeRequest<'a> {
    corp_id: &'a str,
    email: &'a str,
    local_lang: &'a str,
}

#[derive(Serialize, Debug)]
struct VerifyRequest<'a> {
    corp_id: &'a str,
    email: &'a str,
    password: &'a str,
    two_factor: &'a str,
    resource: &'a str,
}

#[derive(Deserialize, Debug)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    msg: String,
    code: i64,
}

impl Authenticator {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Authenticator {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(timeout)?,
        })
    }

    /// Asks the service to mail a one-time code to `email`.
    pub async fn request_code(&self, email: &str) -> anyhow::Result<()> {
        let url = format!("{}/v2/two_factor/email/verifycode", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&CodeRequest {
                corp_id: CORP_ID,
                email,
                local_lang: "en-us",
            })
            .send()
            .await
            .context("Failed to request verification code")?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(describe_failure("verification code request", status, response).await),
        }
    }

    /// Exchanges the mailed code for a session.
    pub async fn verify(
        &self,
        email: &str,
        password: &str,
        code: &str,
    ) -> anyhow::Result<SessionInfo> {
        let url = format!("{}/v2/user_auth/two_factor", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&VerifyRequest {
                corp_id: CORP_ID,
                email,
                password,
                two_factor: code.trim(),
                resource: "abcdefghijklmnop",
            })
            .send()
            .await
            .context("Failed to send two-factor verification")?;

        match response.status() {
            StatusCode::OK => response
                .json::<SessionInfo>()
                .await
                .context("Failed to deserialize session"),
            status => Err(describe_failure("two-factor verification", status, response).await),
        }
    }
}

/// Every request, including reading its body, gives up after `timeout`.
fn build_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

async fn describe_failure(
    what: &str,
    status: StatusCode,
    response: reqwest::Response,
) -> anyhow::Error {
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) => anyhow!(
            "{} failed with status {}: {} (code {})",
            what,
            status,
            err.error.msg,
            err.error.code
        ),
        Err(_) => anyhow!("{} failed with status {}", what, status),
    }
}

#[derive(Deserialize, Debug)]
struct DeviceEntry {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_online: bool,
    #[serde(default)]
    state: Option<DeviceStateEntry>,
}

#[derive(Deserialize, Debug)]
struct DeviceStateEntry {
    #[serde(default)]
    is_on: bool,
    #[serde(default)]
    brightness: u8,
    #[serde(default)]
    rgb: Option<(u8, u8, u8)>,
}

impl From<DeviceEntry> for Device {
    fn from(entry: DeviceEntry) -> Self {
        let state = entry.state.unwrap_or(DeviceStateEntry {
            is_on: entry.is_online,
            brightness: 100,
            rgb: None,
        });
        let name = if entry.name.is_empty() {
            format!("device {}", entry.id)
        } else {
            entry.name
        };
        Device::new(entry.id.to_string(), name).with_status(DeviceStatus {
            online: entry.is_online,
            is_on: state.is_on,
            brightness: state.brightness.min(100),
            rgb: state.rgb,
        })
    }
}

/// JSON client for the device gateway, authenticated by a [`SessionInfo`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: String,
    session: SessionInfo,
    client: Client,
}

impl HttpClient {
    pub fn new(base_url: &str, session: SessionInfo, timeout: Duration) -> anyhow::Result<Self> {
        Ok(HttpClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            client: build_client(timeout)?,
        })
    }

    async fn post_state(
        &self,
        device_id: &str,
        path: &str,
        body: serde_json::Value,
    ) -> anyhow::Result<()> {
        let url = format!("{}/v2/devices/{}/{}", self.base_url, device_id, path);
        debug!("POST {} {}", url, body);
        let response = self
            .client
            .post(&url)
            .header("Access-Token", &self.session.access_token)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to set {} on {}", path, device_id))?;

        if response.status() == StatusCode::OK {
            Ok(())
        } else {
            Err(anyhow!(
                "Failed to set {} on {} with status: {}",
                path,
                device_id,
                response.status()
            ))
        }
    }
}

#[async_trait]
impl DeviceClient for HttpClient {
    async fn list_devices(&self) -> anyhow::Result<Vec<Device>> {
        let url = format!("{}/v2/user/{}/devices", self.base_url, self.session.user_id);
        let response = self
            .client
            .get(&url)
            .header("Access-Token", &self.session.access_token)
            .send()
            .await
            .context("Failed to list devices")?;

        if response.status() != StatusCode::OK {
            return Err(anyhow!(
                "Failed to list devices with status: {}",
                response.status()
            ));
        }
        let entries = response
            .json::<Vec<DeviceEntry>>()
            .await
            .context("Failed to deserialize device list")?;
        Ok(entries.into_iter().map(Device::from).collect())
    }

    async fn set_status(&self, device_id: &str, on: bool) -> anyhow::Result<()> {
        self.post_state(device_id, "status", json!({ "is_on": on })).await
    }

    async fn set_color(
        &self,
        device_id: &str,
        red: u8,
        green: u8,
        blue: u8,
    ) -> anyhow::Result<()> {
        self.post_state(device_id, "color", json!({ "rgb": [red, green, blue] }))
            .await
    }

    async fn set_brightness(&self, device_id: &str, level: u8) -> anyhow::Result<()> {
        self.post_state(device_id, "brightness", json!({ "value": level.min(100) }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_entry_conversion() {
        let entry: DeviceEntry = serde_json::from_str(
            r#"{"id": 1234, "name": "Desk", "is_online": true,
                "state": {"is_on": false, "brightness": 140, "rgb": [1, 2, 3]}}"#,
        )
        .unwrap();
        let device = Device::from(entry);
        assert_eq!(device.id, "1234");
        assert_eq!(device.name, "Desk");
        assert!(device.status.online);
        assert!(!device.status.is_on);
        assert_eq!(device.status.brightness, 100);
        assert_eq!(device.status.rgb, Some((1, 2, 3)));
    }

    #[test]
    fn test_unnamed_device_gets_placeholder() {
        let entry: DeviceEntry = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        let device = Device::from(entry);
        assert_eq!(device.name, "device 7");
        assert!(!device.status.online);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let auth = Authenticator::new("http://localhost:8080/", Duration::from_secs(2)).unwrap();
        assert_eq!(auth.base_url, "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_silent_gateway_times_out() {
        // accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let session = SessionInfo {
            access_token: "abc".into(),
            user_id: 1,
            refresh_token: "def".into(),
            authorize: String::new(),
            expire_in: 0,
        };
        let client = HttpClient::new(
            &format!("http://{}", addr),
            session,
            Duration::from_millis(100),
        )
        .unwrap();
        let started = std::time::Instant::now();
        let listed = tokio::time::timeout(Duration::from_secs(5), client.list_devices())
            .await
            .expect("request outlived its timeout");
        assert!(listed.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
        server.abort();
    }
}
