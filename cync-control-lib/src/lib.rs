//! # Cync Control Library
//!
//! `cync-control-lib` drives a small set of networked color lights from an interactive
//! control loop. A [`controller::Controller`] runs one [`mode::Mode`] at a time; each tick
//! applies the mode's effect to every known device and tells the caller how long to wait
//! before the next one.
//!
//! ## Features
//!
//! - Command, rainbow, roll, pretty and experiment modes
//! - Best-effort distinct color assignment from a fixed palette
//! - Multi-step color and brightness transitions with one task per device
//! - A gateway client with two-factor login, and an in-memory simulator
//!
//! ## Example
//!
//! Cycling simulated lights through the rainbow mode:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cync_control_lib::client::SimulatedClient;
//! use cync_control_lib::controller::{Console, Controller, ControllerSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(SimulatedClient::with_lights(4));
//!     let mut controller =
//!         Controller::new(client, Console::stdin(), ControllerSettings::default()).await?;
//!
//!     // Any line typed on stdin drops back to the command prompt
//!     controller.switch_mode("rainbow").await?;
//!     controller.run(5).await?;
//!
//!     Ok(())
//! }
//! ```

// The `client` module holds the remote capability every device command goes through:
// the `DeviceClient` trait, the HTTP gateway client with its login flow, and a
// simulator that records calls.
pub mod client;

// The `controller` module owns the tick loop, the shared context modes work on,
// console input and the timing settings.
pub mod controller;

// The `device` module describes devices and caches the latest listing.
pub mod device;

pub mod error;

// The `led` module contains colors, the palette, the color assignment engine and the
// transition engine.
pub mod led;

// The `mode` module contains the selectable loop behaviors.
pub mod mode;

pub use client::DeviceClient;
pub use controller::{Console, Controller, ControllerSettings};
pub use error::{ControlError, Result};
