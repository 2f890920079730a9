use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail};

/// Highest brightness a device accepts.
pub const MAX_BRIGHTNESS: u8 = 100;

/// An rgb triple plus the brightness it should be shown at.
///
/// Colors drawn from a [`crate::led::palette::Palette`] carry their display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    /// Range is 0..=100.
    pub brightness: u8,
    pub name: Option<&'static str>,
}

impl Color {
    /// All channels and brightness at zero.
    pub const ZERO: Color = Color {
        red: 0,
        green: 0,
        blue: 0,
        brightness: 0,
        name: None,
    };

    pub const fn named(name: &'static str, red: u8, green: u8, blue: u8) -> Self {
        Color {
            red,
            green,
            blue,
            brightness: MAX_BRIGHTNESS,
            name: Some(name),
        }
    }

    pub fn new(red: u8, green: u8, blue: u8, brightness: u8) -> Self {
        Color {
            red,
            green,
            blue,
            brightness: brightness.min(MAX_BRIGHTNESS),
            name: None,
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn rgb(&self) -> (u8, u8, u8) {
        (self.red, self.green, self.blue)
    }

    /// Compares channels and brightness, ignoring the display name.
    pub fn same_light(&self, other: &Color) -> bool {
        self.rgb() == other.rgb() && self.brightness == other.brightness
    }

    pub fn is_zero(&self) -> bool {
        self.same_light(&Color::ZERO)
    }

    /// No light regardless of brightness.
    pub fn is_black(&self) -> bool {
        self.rgb() == (0, 0, 0)
    }

    pub fn display_name(&self) -> &'static str {
        self.name.unwrap_or("custom")
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:03}, {:03}, {:03}]", self.red, self.green, self.blue)
    }
}

/// Parses `"r g b brightness"`, the format the experiment mode asks for.
impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 4 {
            bail!(
                "expected 4 space-separated numbers (r g b brightness), got {}",
                parts.len()
            );
        }
        let channel = |idx: usize, label: &str| -> anyhow::Result<u8> {
            parts[idx]
                .parse::<u8>()
                .map_err(|e| anyhow!("{} value '{}' is not 0-255: {}", label, parts[idx], e))
        };
        let red = channel(0, "red")?;
        let green = channel(1, "green")?;
        let blue = channel(2, "blue")?;
        let brightness = channel(3, "brightness")?;
        if brightness > MAX_BRIGHTNESS {
            bail!("brightness {} is above {}", brightness, MAX_BRIGHTNESS);
        }
        Ok(Color::new(red, green, blue, brightness).with_name("custom"))
    }
}
