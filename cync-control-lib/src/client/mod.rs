//! The remote capability the controller drives.
//!
//! Everything that actually talks to the lights sits behind [`DeviceClient`]. The
//! controller never assumes a call changed physical state; it only records what it asked
//! for.

use async_trait::async_trait;

use crate::device::Device;

pub mod http;
pub mod session;
pub mod simulated;

pub use http::{Authenticator, HttpClient};
pub use session::SessionInfo;
pub use simulated::{Call, SimulatedClient};

#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Lists every device the session can control.
    async fn list_devices(&self) -> anyhow::Result<Vec<Device>>;

    /// Switches a device on or off.
    async fn set_status(&self, device_id: &str, on: bool) -> anyhow::Result<()>;

    async fn set_color(&self, device_id: &str, red: u8, green: u8, blue: u8)
        -> anyhow::Result<()>;

    /// # Arguments
    /// - `level`: Range is 0..100.
    async fn set_brightness(&self, device_id: &str, level: u8) -> anyhow::Result<()>;
}
