//! The selectable behaviors of the control loop.
//!
//! Each variant keeps its own state between `on_switch` and `on_exit`. Anything derived
//! from the device list is rebuilt whenever the cache generation moves, so a mode entered
//! before devices were discovered picks them up on a later tick.

use std::time::Duration;

use log::warn;

use crate::controller::Context;
use crate::error::Result;
use crate::led::color::Color;

pub mod command;
pub mod experiment;
pub mod pretty;
pub mod rainbow;
pub mod roll;

pub use command::CommandMode;
pub use experiment::ExperimentMode;
pub use pretty::{Application, PrettyMode, Selection};
pub use rainbow::RainbowMode;
pub use roll::RollMode;

pub const COMMAND: &str = "command";
pub const RAINBOW: &str = "rainbow";
pub const ROLL: &str = "roll";
pub const PRETTY: &str = "pretty";
pub const EXPERIMENT: &str = "experiment";

pub enum Mode {
    Command(CommandMode),
    Rainbow(RainbowMode),
    Roll(RollMode),
    Pretty(PrettyMode),
    Experiment(ExperimentMode),
}

impl Mode {
    /// One instance of every mode, in the order `modes` lists them.
    pub fn registry() -> Vec<Mode> {
        vec![
            Mode::Command(CommandMode::default()),
            Mode::Rainbow(RainbowMode::default()),
            Mode::Roll(RollMode::default()),
            Mode::Pretty(PrettyMode::default()),
            Mode::Experiment(ExperimentMode::default()),
        ]
    }

    pub fn id(&self) -> &'static str {
        match self {
            Mode::Command(_) => COMMAND,
            Mode::Rainbow(_) => RAINBOW,
            Mode::Roll(_) => ROLL,
            Mode::Pretty(_) => PRETTY,
            Mode::Experiment(_) => EXPERIMENT,
        }
    }

    /// Indefinite modes keep running until a line of input interrupts them.
    pub fn is_indefinite(&self) -> bool {
        matches!(self, Mode::Rainbow(_) | Mode::Roll(_) | Mode::Pretty(_))
    }

    pub async fn on_switch(&mut self, ctx: &mut Context) -> Result<()> {
        println!("[{}] entering mode", self.id());
        match self {
            Mode::Command(mode) => mode.on_switch(ctx),
            Mode::Rainbow(_) => {}
            Mode::Roll(mode) => mode.on_switch(),
            Mode::Pretty(mode) => mode.on_switch(ctx).await?,
            Mode::Experiment(mode) => mode.on_switch(),
        }
        Ok(())
    }

    /// Runs one tick and returns how long to sleep before the next.
    pub async fn run(&mut self, ctx: &mut Context) -> Result<Duration> {
        match self {
            Mode::Command(mode) => mode.run(ctx).await,
            Mode::Rainbow(mode) => mode.run(ctx).await,
            Mode::Roll(mode) => mode.run(ctx).await,
            Mode::Pretty(mode) => mode.run(ctx).await,
            Mode::Experiment(mode) => mode.run(ctx).await,
        }
    }

    pub fn on_exit(&mut self, _ctx: &mut Context) {
        println!("[{}] leaving mode", self.id());
    }
}

/// Device ids as of one cache generation.
#[derive(Debug, Default)]
pub(crate) struct DeviceTracker {
    generation: Option<u64>,
    ids: Vec<String>,
}

impl DeviceTracker {
    /// Re-reads the ids if the cache changed since the last call. Returns true when it did.
    pub fn sync(&mut self, ctx: &Context) -> bool {
        let generation = ctx.generation();
        if self.generation == Some(generation) {
            return false;
        }
        self.ids = ctx.devices().iter().map(|device| device.id.clone()).collect();
        self.generation = Some(generation);
        true
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Ambient modes tolerate a stale list, so a failed refresh only gets logged.
pub(crate) async fn refresh_when_stale(ctx: &mut Context) {
    let threshold = ctx.settings().stale_after;
    if let Err(err) = ctx.refresh_if_stale(threshold).await {
        warn!("{}; keeping {} cached devices", err, ctx.devices().len());
    }
}

pub(crate) fn print_row(name: &str, color: &Color) {
    println!("{}", format_row(name, color));
}

/// `| device | color name | [r, g, b] |`, one line per device and tick.
pub(crate) fn format_row(name: &str, color: &Color) -> String {
    format!(
        "| {:<20} | {:<20} | {:<20} |",
        name,
        color.display_name(),
        color.to_string()
    )
}

pub(crate) fn device_name(ctx: &Context, device_id: &str) -> String {
    ctx.device(device_id)
        .map(|device| device.name.clone())
        .unwrap_or_else(|| device_id.to_string())
}
