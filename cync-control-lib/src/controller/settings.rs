use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::led::assign::DEFAULT_ATTEMPTS;
use crate::led::transition::TransitionSettings;

/// Timing knobs for the control loop and the ambient modes.
///
/// Durations are written in milliseconds when loaded from JSON. Missing keys keep their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// How long an indefinite mode waits for a line of input each tick.
    #[serde(with = "millis")]
    pub input_window: Duration,
    /// Cache age after which ambient modes refresh the device list.
    #[serde(with = "millis")]
    pub stale_after: Duration,
    /// Pause between devices within one tick.
    #[serde(with = "millis")]
    pub device_delay: Duration,
    #[serde(with = "millis")]
    pub rainbow_interval: Duration,
    #[serde(with = "millis")]
    pub roll_interval: Duration,
    #[serde(with = "millis")]
    pub pretty_hold: Duration,
    pub transition: TransitionSettings,
    pub assignment_attempts: usize,
    /// Upper bound on one request to the device gateway, body included.
    #[serde(with = "millis")]
    pub request_timeout: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        ControllerSettings {
            input_window: Duration::from_millis(50),
            stale_after: Duration::from_secs(30),
            device_delay: Duration::from_millis(50),
            rainbow_interval: Duration::from_millis(1000),
            roll_interval: Duration::from_millis(50),
            pretty_hold: Duration::from_secs(2),
            transition: TransitionSettings::default(),
            assignment_attempts: DEFAULT_ATTEMPTS,
            request_timeout: Duration::from_secs(2),
        }
    }
}

impl ControllerSettings {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    /// No pauses anywhere; used by tests and simulations.
    pub fn immediate() -> Self {
        ControllerSettings {
            input_window: Duration::from_millis(10),
            device_delay: Duration::ZERO,
            rainbow_interval: Duration::ZERO,
            roll_interval: Duration::ZERO,
            pretty_hold: Duration::ZERO,
            transition: TransitionSettings {
                steps: 3,
                delay: Duration::ZERO,
            },
            ..Self::default()
        }
    }
}

pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings: ControllerSettings =
            serde_json::from_str(r#"{"input_window": 250, "transition": {"steps": 4}}"#).unwrap();
        assert_eq!(settings.input_window, Duration::from_millis(250));
        assert_eq!(settings.transition.steps, 4);
        assert_eq!(settings.transition.delay, Duration::from_millis(100));
        assert_eq!(settings.stale_after, Duration::from_secs(30));
        assert_eq!(settings.assignment_attempts, 1000);
        assert_eq!(settings.request_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_request_timeout_in_millis() {
        let settings: ControllerSettings =
            serde_json::from_str(r#"{"request_timeout": 750}"#).unwrap();
        assert_eq!(settings.request_timeout, Duration::from_millis(750));
        assert_eq!(settings.input_window, Duration::from_millis(50));
    }
}
