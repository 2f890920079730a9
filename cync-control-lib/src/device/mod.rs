use serde::{Deserialize, Serialize};

pub mod cache;

/// Last state a device reported when the cache was filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub online: bool,
    pub is_on: bool,
    /// Range is 0..=100.
    pub brightness: u8,
    #[serde(default)]
    pub rgb: Option<(u8, u8, u8)>,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        DeviceStatus {
            online: true,
            is_on: true,
            brightness: 100,
            rgb: None,
        }
    }
}

/// A controllable light as listed by the remote service.
///
/// Commands are issued through a [`crate::client::DeviceClient`] keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: DeviceStatus,
}

impl Device {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Device {
            id: id.into(),
            name: name.into(),
            status: DeviceStatus::default(),
        }
    }

    pub fn with_status(mut self, status: DeviceStatus) -> Self {
        self.status = status;
        self
    }
}
