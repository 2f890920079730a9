use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::Instant;

use crate::device::Device;

/// The most recent device listing.
///
/// Every successful [`DeviceCache::replace`] bumps the generation, which modes use to
/// notice that per-device state they derived earlier is out of date.
#[derive(Debug, Default)]
pub struct DeviceCache {
    devices: Vec<Device>,
    updated_at: Option<Instant>,
    refreshed_at: Option<DateTime<Local>>,
    generation: u64,
}

impl DeviceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|device| device.id == id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wall-clock time of the last successful refresh, for display.
    pub fn refreshed_at(&self) -> Option<DateTime<Local>> {
        self.refreshed_at
    }

    /// Time since the last successful refresh, `None` if there never was one.
    pub fn age(&self) -> Option<Duration> {
        self.updated_at.map(|at| at.elapsed())
    }

    /// A cache that was never filled is always stale.
    pub fn is_stale(&self, threshold: Duration) -> bool {
        self.age().map_or(true, |age| age > threshold)
    }

    pub fn replace(&mut self, devices: Vec<Device>) {
        self.devices = devices;
        self.updated_at = Some(Instant::now());
        self.refreshed_at = Some(Local::now());
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache_is_stale() {
        let cache = DeviceCache::new();
        assert!(cache.is_stale(Duration::from_secs(30)));
        assert_eq!(cache.generation(), 0);
        assert!(cache.refreshed_at().is_none());
    }

    #[test]
    fn test_replace_bumps_generation() {
        let mut cache = DeviceCache::new();
        cache.replace(vec![Device::new("1", "desk")]);
        cache.replace(vec![Device::new("1", "desk"), Device::new("2", "shelf")]);
        assert_eq!(cache.generation(), 2);
        assert_eq!(cache.len(), 2);
        assert!(!cache.is_stale(Duration::from_secs(30)));
        assert_eq!(cache.get("2").map(|d| d.name.as_str()), Some("shelf"));
    }
}
