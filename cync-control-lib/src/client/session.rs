use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

/// Environment variable holding a cached session.
pub const SESSION_ENV: &str = "CYNC_SESSION";

/// Opaque credentials returned by a successful login.
///
/// Serialized as JSON so the operator can keep it in [`SESSION_ENV`] and skip the
/// two-factor prompt next time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub access_token: String,
    pub user_id: u64,
    pub refresh_token: String,
    #[serde(default)]
    pub authorize: String,
    /// Seconds until `access_token` expires, as reported at login.
    #[serde(default)]
    pub expire_in: u64,
}

impl SessionInfo {
    pub fn from_json(raw: &str) -> Result<Self> {
        let session: SessionInfo = serde_json::from_str(raw.trim())
            .map_err(|e| ControlError::Session(format!("couldn't parse cached session: {}", e)))?;
        if session.access_token.is_empty() {
            return Err(ControlError::Session(
                "cached session has no access token".to_string(),
            ));
        }
        Ok(session)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| ControlError::Session(format!("couldn't serialize session: {}", e)))
    }
}
