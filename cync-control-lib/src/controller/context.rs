use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::task::JoinHandle;

use crate::client::DeviceClient;
use crate::controller::input::Console;
use crate::controller::settings::ControllerSettings;
use crate::device::cache::DeviceCache;
use crate::device::Device;
use crate::error::{ControlError, Result};
use crate::led::assign::{ColorAssigner, ColorSource, RandomSource};
use crate::led::color::{Color, MAX_BRIGHTNESS};
use crate::led::palette::Palette;
use crate::led::transition::TransitionEngine;

/// Everything a mode may read or change during a tick.
///
/// Owned by the [`crate::controller::Controller`] and lent to the active mode. Only the
/// driver mutates it; spawned device tasks report back through the transition engine.
pub struct Context {
    client: Arc<dyn DeviceClient>,
    cache: DeviceCache,
    last_colors: HashMap<String, Color>,
    running: bool,
    console: Console,
    settings: ControllerSettings,
    palette: Palette,
    assigner: ColorAssigner,
    colors: Box<dyn ColorSource + Send>,
    transitions: TransitionEngine,
    mode_ids: Vec<&'static str>,
    pending_switch: Option<String>,
}

impl Context {
    pub(crate) fn new(
        client: Arc<dyn DeviceClient>,
        console: Console,
        settings: ControllerSettings,
        mode_ids: Vec<&'static str>,
    ) -> Self {
        let transitions = TransitionEngine::new(Arc::clone(&client), settings.transition);
        Context {
            client,
            cache: DeviceCache::new(),
            last_colors: HashMap::new(),
            running: true,
            console,
            assigner: ColorAssigner::new(settings.assignment_attempts),
            settings,
            palette: Palette::base(),
            colors: Box::new(RandomSource::from_entropy()),
            transitions,
            mode_ids,
            pending_switch: None,
        }
    }

    pub(crate) fn set_color_source(&mut self, source: Box<dyn ColorSource + Send>) {
        self.colors = source;
    }

    pub fn devices(&self) -> &[Device] {
        self.cache.devices()
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.cache.get(id)
    }

    /// Generation of the device list; changes on every successful refresh.
    pub fn generation(&self) -> u64 {
        self.cache.generation()
    }

    pub fn last_color(&self, device_id: &str) -> Option<Color> {
        self.last_colors.get(device_id).copied()
    }

    pub fn last_colors(&self) -> &HashMap<String, Color> {
        &self.last_colors
    }

    /// Replaces the device list. On failure the previous list stays in place.
    pub async fn refresh_device_cache(&mut self) -> Result<()> {
        let devices = self
            .client
            .list_devices()
            .await
            .map_err(ControlError::CacheRefresh)?;
        debug!("device cache refreshed with {} devices", devices.len());
        self.cache.replace(devices);
        Ok(())
    }

    /// Refreshes when the list is older than `threshold`. Returns whether it refreshed.
    pub async fn refresh_if_stale(&mut self, threshold: Duration) -> Result<bool> {
        if !self.cache.is_stale(threshold) {
            return Ok(false);
        }
        self.refresh_device_cache().await?;
        Ok(true)
    }

    pub async fn set_status(&self, device_id: &str, on: bool) -> Result<()> {
        self.client
            .set_status(device_id, on)
            .await
            .map_err(|e| ControlError::device(device_id, e))
    }

    /// The color is recorded as last assigned before the call goes out, whatever its
    /// outcome.
    pub async fn set_color(&mut self, device_id: &str, color: Color) -> Result<()> {
        self.last_colors.insert(device_id.to_string(), color);
        let (red, green, blue) = color.rgb();
        self.client
            .set_color(device_id, red, green, blue)
            .await
            .map_err(|e| ControlError::device(device_id, e))
    }

    pub async fn set_brightness(&mut self, device_id: &str, level: u8) -> Result<()> {
        self.note_brightness(device_id, level);
        self.client
            .set_brightness(device_id, level)
            .await
            .map_err(|e| ControlError::device(device_id, e))
    }

    pub fn set_status_detached(&self, device_id: &str, on: bool) -> JoinHandle<()> {
        let client = Arc::clone(&self.client);
        let device_id = device_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = client.set_status(&device_id, on).await {
                warn!("switching {} {} failed: {:#}", device_id, on_off(on), err);
            }
        })
    }

    pub fn set_color_detached(&mut self, device_id: &str, color: Color) -> JoinHandle<()> {
        self.last_colors.insert(device_id.to_string(), color);
        let client = Arc::clone(&self.client);
        let device_id = device_id.to_string();
        tokio::spawn(async move {
            let (red, green, blue) = color.rgb();
            if let Err(err) = client.set_color(&device_id, red, green, blue).await {
                warn!("setting color {} on {} failed: {:#}", color, device_id, err);
            }
        })
    }

    pub fn set_brightness_detached(&mut self, device_id: &str, level: u8) -> JoinHandle<()> {
        self.note_brightness(device_id, level);
        let client = Arc::clone(&self.client);
        let device_id = device_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = client.set_brightness(&device_id, level).await {
                warn!("setting brightness {} on {} failed: {:#}", level, device_id, err);
            }
        })
    }

    fn note_brightness(&mut self, device_id: &str, level: u8) {
        if let Some(last) = self.last_colors.get_mut(device_id) {
            last.brightness = level.min(MAX_BRIGHTNESS);
        }
    }

    /// One palette color per cached device, avoiding repeats and collisions where it can.
    pub fn assign_colors(&mut self) -> Vec<(String, Color)> {
        self.assigner.assign(
            &self.palette,
            self.cache.devices().iter().map(|device| device.id.as_str()),
            &self.last_colors,
            self.colors.as_mut(),
        )
    }

    pub fn transitions(&self) -> &TransitionEngine {
        &self.transitions
    }

    /// Waits for every spawned ramp and records where each one ended.
    pub async fn finish_transitions(&mut self) -> usize {
        let finished = self.transitions.wait().await;
        let count = finished.len();
        for (device_id, color) in finished {
            self.last_colors.insert(device_id, color);
        }
        count
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Asks the controller to switch to `mode_id` once the current tick is done.
    pub fn request_switch(&mut self, mode_id: &str) {
        self.pending_switch = Some(mode_id.to_string());
    }

    pub(crate) fn take_pending_switch(&mut self) -> Option<String> {
        self.pending_switch.take()
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn mode_ids(&self) -> &[&'static str] {
        &self.mode_ids
    }

    pub fn has_mode(&self, mode_id: &str) -> bool {
        self.mode_ids.iter().any(|id| *id == mode_id)
    }

    pub fn print_devices(&self) {
        println!(
            "| {:<10} | {:<20} | {:<6} | {:<3} | {:<10} | {:<24} |",
            "id", "name", "online", "on", "brightness", "last color"
        );
        for device in self.cache.devices() {
            let last = self
                .last_colors
                .get(&device.id)
                .map(|color| format!("{} {}", color.display_name(), color))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "| {:<10} | {:<20} | {:<6} | {:<3} | {:<10} | {:<24} |",
                device.id,
                device.name,
                device.status.online,
                on_off(device.status.is_on),
                device.status.brightness,
                last
            );
        }
        match (self.cache.refreshed_at(), self.cache.age()) {
            (Some(at), Some(age)) => println!(
                "{} devices, refreshed at {} ({}s ago)",
                self.cache.len(),
                at.format("%H:%M:%S"),
                age.as_secs()
            ),
            _ => println!("device list was never refreshed"),
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
