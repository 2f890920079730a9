//! The tick loop and everything it owns.
//!
//! A [`Controller`] holds the mode registry, the active mode and a [`Context`] with the
//! shared state modes work on. Callers switch into a first mode, then call
//! [`Controller::tick`] and sleep for the returned duration until
//! [`Controller::is_running`] turns false. [`Controller::run`] does exactly that.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::time::sleep;

use crate::client::DeviceClient;
use crate::error::{ControlError, Result};
use crate::led::assign::ColorSource;
use crate::mode::{Mode, COMMAND};

pub mod context;
pub mod input;
pub mod settings;

pub use context::Context;
pub use input::{Console, InputListener, LineSource, ScriptedLines, StdinLines};
pub use settings::ControllerSettings;

/// Sleep requested after input interrupts an indefinite mode.
const INTERRUPT_SLEEP: Duration = Duration::from_millis(1);
/// Pause after a failed tick before the next attempt.
const RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct Controller {
    ctx: Context,
    modes: BTreeMap<&'static str, Mode>,
    active: Option<&'static str>,
    listener: Option<InputListener>,
}

impl Controller {
    /// Builds the registry and fills the device cache once.
    ///
    /// No mode is active afterwards; switch into one before ticking.
    pub async fn new(
        client: Arc<dyn DeviceClient>,
        console: Console,
        settings: ControllerSettings,
    ) -> Result<Self> {
        let registry = Mode::registry();
        let mode_ids = registry.iter().map(Mode::id).collect();
        let modes = registry.into_iter().map(|mode| (mode.id(), mode)).collect();

        let mut ctx = Context::new(client, console, settings, mode_ids);
        ctx.refresh_device_cache().await?;
        info!("controller ready with {} devices", ctx.devices().len());

        Ok(Controller {
            ctx,
            modes,
            active: None,
            listener: None,
        })
    }

    /// Replaces the random palette draws, e.g. with a seeded or scripted source.
    pub fn with_color_source(mut self, source: impl ColorSource + Send + 'static) -> Self {
        self.ctx.set_color_source(Box::new(source));
        self
    }

    /// Leaves the active mode and enters `mode_id`.
    ///
    /// An unknown id changes nothing. Errors from the new mode's setup are returned with
    /// the new mode already active.
    pub async fn switch_mode(&mut self, mode_id: &str) -> Result<()> {
        let Some((&id, _)) = self.modes.get_key_value(mode_id) else {
            return Err(ControlError::UnknownMode(mode_id.to_string()));
        };

        if let Some(previous) = self.active.take() {
            if let Some(mode) = self.modes.get_mut(previous) {
                mode.on_exit(&mut self.ctx);
            }
        }
        self.stop_listener().await;

        debug!("switching to mode {}", id);
        self.active = Some(id);
        match self.modes.get_mut(id) {
            Some(mode) => mode.on_switch(&mut self.ctx).await,
            None => Err(ControlError::UnknownMode(id.to_string())),
        }
    }

    async fn stop_listener(&mut self) {
        if let Some(listener) = self.listener.take() {
            if let Err(err) = listener.stop().await {
                warn!("input listener ended abnormally: {}", err);
            }
        }
    }

    /// Runs one tick of the active mode and returns how long to sleep before the next.
    pub async fn tick(&mut self) -> Result<Duration> {
        let id = self
            .active
            .ok_or_else(|| ControlError::UnknownMode("<none>".to_string()))?;
        let indefinite = self.modes.get(id).is_some_and(Mode::is_indefinite);

        if indefinite {
            let window = self.ctx.settings().input_window;
            let console = self.ctx.console();
            let listener = self.listener.get_or_insert_with(|| console.listen());
            let line = listener.poll(window).await;
            if let Some(line) = line {
                if !line.trim().is_empty() {
                    info!("input received, leaving {}", id);
                    self.switch_mode(COMMAND)
                        .await
                        .map_err(|err| ControlError::in_mode(COMMAND, err))?;
                    return Ok(INTERRUPT_SLEEP);
                }
            }
        }

        let result = match self.modes.get_mut(id) {
            Some(mode) => mode.run(&mut self.ctx).await,
            None => Err(ControlError::UnknownMode(id.to_string())),
        };
        self.apply_pending_switch().await;

        match result {
            Ok(sleep_for) => Ok(sleep_for),
            Err(err) if err.is_unknown_mode() => {
                warn!("{}", err);
                Ok(INTERRUPT_SLEEP)
            }
            Err(err) => Err(ControlError::in_mode(id, err)),
        }
    }

    async fn apply_pending_switch(&mut self) {
        let Some(next) = self.ctx.take_pending_switch() else {
            return;
        };
        match self.switch_mode(&next).await {
            Ok(()) => {}
            Err(err) if err.is_unknown_mode() => println!("{}", err),
            Err(err) => {
                error!("couldn't enter mode {}: {}", next, err);
                println!("couldn't enter mode {}: {}", next, err);
                if next != COMMAND {
                    if let Err(err) = self.switch_mode(COMMAND).await {
                        error!("couldn't fall back to {}: {}", COMMAND, err);
                    }
                }
            }
        }
    }

    /// Ticks until the loop is stopped.
    ///
    /// Failed ticks are retried after a short pause; `max_failures` consecutive failures
    /// end the loop with the last error.
    pub async fn run(&mut self, max_failures: usize) -> Result<()> {
        let mut failures = 0;
        while self.ctx.is_running() {
            match self.tick().await {
                Ok(sleep_for) => {
                    failures = 0;
                    if !sleep_for.is_zero() {
                        sleep(sleep_for).await;
                    }
                }
                Err(err) => {
                    failures += 1;
                    error!("tick failed ({}/{}): {}", failures, max_failures, err);
                    if failures >= max_failures {
                        self.shutdown().await;
                        return Err(err);
                    }
                    sleep(RETRY_DELAY).await;
                }
            }
        }
        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Some(previous) = self.active.take() {
            if let Some(mode) = self.modes.get_mut(previous) {
                mode.on_exit(&mut self.ctx);
            }
        }
        self.stop_listener().await;
    }

    pub fn is_running(&self) -> bool {
        self.ctx.is_running()
    }

    pub fn active_mode_id(&self) -> Option<&'static str> {
        self.active
    }

    pub fn mode_ids(&self) -> &[&'static str] {
        self.ctx.mode_ids()
    }

    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }
}
