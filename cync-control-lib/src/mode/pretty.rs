use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use log::debug;
use tokio::time::sleep;

use crate::controller::Context;
use crate::error::{ControlError, Result};
use crate::led::color::Color;
use crate::mode::{device_name, print_row, refresh_when_stale, DeviceTracker};

/// How the next color for each device is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    /// Random palette colors, no repeats or collisions where avoidable.
    #[default]
    Random,
    /// Walk the palette in order.
    Incremental,
}

/// How a chosen color reaches the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Application {
    #[default]
    Instant,
    /// Step the color over from the previous one.
    Smooth,
    /// Dim to dark, switch color, come back up.
    Fade,
}

impl FromStr for Selection {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "random" | "r" => Ok(Selection::Random),
            "incremental" | "i" => Ok(Selection::Incremental),
            other => Err(ControlError::input(format!(
                "unknown color selection '{}', expected random or incremental",
                other
            ))),
        }
    }
}

impl FromStr for Application {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "instant" | "i" => Ok(Application::Instant),
            "smooth" | "s" => Ok(Application::Smooth),
            "fade" | "f" => Ok(Application::Fade),
            other => Err(ControlError::input(format!(
                "unknown application '{}', expected instant, smooth or fade",
                other
            ))),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Random => write!(f, "random"),
            Selection::Incremental => write!(f, "incremental"),
        }
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Application::Instant => write!(f, "instant"),
            Application::Smooth => write!(f, "smooth"),
            Application::Fade => write!(f, "fade"),
        }
    }
}

#[derive(Debug, Default)]
pub struct PrettyMode {
    selection: Selection,
    application: Application,
    devices: DeviceTracker,
    index: usize,
}

impl PrettyMode {
    pub async fn on_switch(&mut self, ctx: &mut Context) -> Result<()> {
        let answer = ctx
            .console()
            .prompt("pretty", "color selection (random/incremental)")
            .await?
            .ok_or_else(|| ControlError::input("no color selection given"))?;
        self.selection = answer.parse()?;

        let answer = ctx
            .console()
            .prompt("pretty", "application (instant/smooth/fade)")
            .await?
            .ok_or_else(|| ControlError::input("no application given"))?;
        self.application = answer.parse()?;

        self.devices.reset();
        self.index = 0;
        println!(
            "[pretty] {} colors, applied {}",
            self.selection, self.application
        );
        Ok(())
    }

    pub async fn run(&mut self, ctx: &mut Context) -> Result<Duration> {
        refresh_when_stale(ctx).await;
        if self.devices.sync(ctx) {
            self.index = 0;
        }

        let targets: Vec<(String, Color)> = match self.selection {
            Selection::Random => ctx.assign_colors(),
            Selection::Incremental => {
                let targets = self
                    .devices
                    .ids()
                    .iter()
                    .enumerate()
                    .map(|(offset, id)| (id.clone(), ctx.palette().wrapping(self.index + offset)))
                    .collect();
                self.index = (self.index + 1) % ctx.palette().len();
                targets
            }
        };

        let delay = ctx.settings().device_delay;
        match self.application {
            Application::Instant => {
                for (device_id, color) in &targets {
                    ctx.set_color_detached(device_id, *color);
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                }
            }
            Application::Smooth => {
                for (device_id, to) in &targets {
                    let from = current_color(ctx, device_id, *to);
                    ctx.transitions().spawn_color(device_id, from, *to);
                }
                let finished = ctx.finish_transitions().await;
                debug!("{} color ramps finished", finished);
            }
            Application::Fade => {
                for (device_id, color) in &targets {
                    let from = current_color(ctx, device_id, *color).brightness;
                    ctx.transitions().spawn_brightness(device_id, from, 0, *color);
                }
                let finished = ctx.finish_transitions().await;
                debug!("{} brightness ramps finished", finished);
                for (device_id, color) in &targets {
                    ctx.set_brightness_detached(device_id, color.brightness);
                }
            }
        }

        for (device_id, color) in &targets {
            print_row(&device_name(ctx, device_id), color);
        }
        Ok(ctx.settings().pretty_hold)
    }
}

/// Last color sent to the device, else what it last reported, else `fallback`.
fn current_color(ctx: &Context, device_id: &str, fallback: Color) -> Color {
    if let Some(color) = ctx.last_color(device_id) {
        return color;
    }
    ctx.device(device_id)
        .and_then(|device| {
            device
                .status
                .rgb
                .map(|rgb| Color::new(rgb.0, rgb.1, rgb.2, device.status.brightness))
        })
        .unwrap_or(fallback)
}
