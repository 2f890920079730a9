use std::time::Duration;

use crate::controller::Context;
use crate::error::{ControlError, Result};
use crate::led::color::Color;
use crate::mode::{device_name, DeviceTracker, COMMAND};

const TICK: Duration = Duration::from_millis(50);

/// Manual calibration: asks for a literal color for each device in turn.
#[derive(Debug, Default)]
pub struct ExperimentMode {
    devices: DeviceTracker,
    position: usize,
}

impl ExperimentMode {
    pub fn on_switch(&mut self) {
        self.devices.reset();
        self.position = 0;
        println!("[experiment] enter 'r g b brightness' for each device, 'exit' to go back");
    }

    pub async fn run(&mut self, ctx: &mut Context) -> Result<Duration> {
        if self.devices.sync(ctx) {
            self.position = 0;
        }
        if self.devices.ids().is_empty() {
            if let Err(err) = ctx.refresh_device_cache().await {
                println!("{}", err);
            }
            self.devices.sync(ctx);
            if self.devices.ids().is_empty() {
                println!("[experiment] no devices to experiment with");
                ctx.request_switch(COMMAND);
                return Ok(TICK);
            }
        }

        let device_id = self.devices.ids()[self.position % self.devices.ids().len()].clone();
        let prompt = format!("color for {}", device_name(ctx, &device_id));
        let Some(line) = ctx.console().prompt("experiment", &prompt).await? else {
            ctx.request_switch(COMMAND);
            return Ok(TICK);
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") {
            ctx.request_switch(COMMAND);
            return Ok(TICK);
        }

        let color = match line.parse::<Color>() {
            Ok(color) => color,
            Err(err) => {
                println!("{}", ControlError::input(format!("{:#}", err)));
                println!("usage: r g b brightness, for example 255 0 0 100");
                return Ok(TICK);
            }
        };
        if let Err(err) = ctx.set_color(&device_id, color).await {
            println!("{}", err);
        }
        if let Err(err) = ctx.set_brightness(&device_id, color.brightness).await {
            println!("{}", err);
        }
        self.position += 1;
        Ok(TICK)
    }
}
