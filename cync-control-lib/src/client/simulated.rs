use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use log::debug;
use tokio::time::sleep;

use crate::client::DeviceClient;
use crate::device::Device;

/// One call received by a [`SimulatedClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Status { device: String, on: bool },
    Color { device: String, rgb: (u8, u8, u8) },
    Brightness { device: String, level: u8 },
}

impl Call {
    pub fn device(&self) -> Option<&str> {
        match self {
            Call::List => None,
            Call::Status { device, .. }
            | Call::Color { device, .. }
            | Call::Brightness { device, .. } => Some(device),
        }
    }
}

/// In-memory lights that remember every call made to them.
///
/// Calls to a device marked with [`SimulatedClient::fail_device`] are still recorded,
/// then fail.
#[derive(Debug, Default)]
pub struct SimulatedClient {
    devices: Mutex<Vec<Device>>,
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<String>>,
    fail_listing: AtomicBool,
    latency: Duration,
}

impl SimulatedClient {
    pub fn new(devices: Vec<Device>) -> Self {
        SimulatedClient {
            devices: Mutex::new(devices),
            ..Default::default()
        }
    }

    /// `count` devices named "Light 1" through "Light {count}".
    pub fn with_lights(count: usize) -> Self {
        Self::new(
            (1..=count)
                .map(|i| Device::new(format!("{:04}", i), format!("Light {}", i)))
                .collect(),
        )
    }

    /// Delay every command by `latency`, like a remote round trip would.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_for(&self, device_id: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.device() == Some(device_id))
            .collect()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    pub fn set_devices(&self, devices: Vec<Device>) {
        if let Ok(mut current) = self.devices.lock() {
            *current = devices;
        }
    }

    pub fn fail_device(&self, device_id: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(device_id.to_string());
        }
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        debug!("simulated call: {:?}", call);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    /// Fails for unknown or failing devices, otherwise applies `update` to the device.
    fn apply(&self, device_id: &str, update: impl FnOnce(&mut Device)) -> anyhow::Result<()> {
        let failing = self
            .failing
            .lock()
            .map_err(|_| anyhow!("simulated client poisoned"))?
            .contains(device_id);
        if failing {
            bail!("device {} did not respond", device_id);
        }
        let mut devices = self
            .devices
            .lock()
            .map_err(|_| anyhow!("simulated client poisoned"))?;
        let device = devices
            .iter_mut()
            .find(|device| device.id == device_id)
            .ok_or_else(|| anyhow!("unknown device {}", device_id))?;
        update(device);
        Ok(())
    }

    async fn round_trip(&self) {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl DeviceClient for SimulatedClient {
    async fn list_devices(&self) -> anyhow::Result<Vec<Device>> {
        self.record(Call::List);
        self.round_trip().await;
        if self.fail_listing.load(Ordering::SeqCst) {
            bail!("device listing unavailable");
        }
        self.devices
            .lock()
            .map(|devices| devices.clone())
            .map_err(|_| anyhow!("simulated client poisoned"))
    }

    async fn set_status(&self, device_id: &str, on: bool) -> anyhow::Result<()> {
        self.record(Call::Status {
            device: device_id.to_string(),
            on,
        });
        self.round_trip().await;
        self.apply(device_id, |device| device.status.is_on = on)
    }

    async fn set_color(
        &self,
        device_id: &str,
        red: u8,
        green: u8,
        blue: u8,
    ) -> anyhow::Result<()> {
        self.record(Call::Color {
            device: device_id.to_string(),
            rgb: (red, green, blue),
        });
        self.round_trip().await;
        self.apply(device_id, |device| device.status.rgb = Some((red, green, blue)))
    }

    async fn set_brightness(&self, device_id: &str, level: u8) -> anyhow::Result<()> {
        self.record(Call::Brightness {
            device: device_id.to_string(),
            level,
        });
        self.round_trip().await;
        self.apply(device_id, |device| device.status.brightness = level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_and_updates_state() {
        let client = SimulatedClient::with_lights(2);
        client.set_color("0001", 1, 2, 3).await.unwrap();
        client.set_status("0002", false).await.unwrap();
        let devices = client.list_devices().await.unwrap();
        assert_eq!(devices[0].status.rgb, Some((1, 2, 3)));
        assert!(!devices[1].status.is_on);
        assert_eq!(client.calls().len(), 3);
        assert_eq!(client.calls_for("0001").len(), 1);
    }

    #[tokio::test]
    async fn test_failing_device_still_records() {
        let client = SimulatedClient::with_lights(1);
        client.fail_device("0001");
        assert!(client.set_brightness("0001", 10).await.is_err());
        assert!(client.set_brightness("nope", 10).await.is_err());
        assert_eq!(client.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_listing_failure() {
        let client = SimulatedClient::with_lights(1);
        client.fail_listing(true);
        assert!(client.list_devices().await.is_err());
    }
}
