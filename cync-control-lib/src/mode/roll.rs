use std::time::Duration;

use log::debug;
use tokio::time::sleep;

use crate::controller::Context;
use crate::error::Result;
use crate::mode::{device_name, print_row, refresh_when_stale, DeviceTracker};

/// Rotates the palette across the devices, one position per tick.
///
/// Device `i` shows `palette[(index + i) % len]`.
#[derive(Debug, Default)]
pub struct RollMode {
    devices: DeviceTracker,
    index: usize,
}

impl RollMode {
    pub fn on_switch(&mut self) {
        self.devices.reset();
        self.index = 0;
    }

    pub async fn run(&mut self, ctx: &mut Context) -> Result<Duration> {
        refresh_when_stale(ctx).await;
        if self.devices.sync(ctx) {
            debug!("roll restarting over {} devices", self.devices.ids().len());
            self.index = 0;
        }
        let delay = ctx.settings().device_delay;

        for (offset, device_id) in self.devices.ids().iter().enumerate() {
            let color = ctx.palette().wrapping(self.index + offset);
            ctx.set_color_detached(device_id, color);
            print_row(&device_name(ctx, device_id), &color);
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }
        self.index = (self.index + 1) % ctx.palette().len();
        Ok(ctx.settings().roll_interval)
    }
}
