use std::ops::Index;

use crate::led::color::Color;

pub const RED: Color = Color::named("red", 255, 0, 0);
pub const ORANGE: Color = Color::named("orange", 255, 128, 0);
pub const YELLOW: Color = Color::named("yellow", 255, 255, 0);
pub const YELLOW_GREEN: Color = Color::named("yellow-green", 128, 255, 0);
pub const GREEN: Color = Color::named("green", 0, 255, 0);
pub const TEAL_GREEN: Color = Color::named("teal-green", 0, 255, 128);
pub const TEAL: Color = Color::named("teal", 0, 255, 255);
pub const LIGHT_BLUE: Color = Color::named("light-blue", 0, 128, 255);
pub const BLUE: Color = Color::named("blue", 0, 0, 255);
pub const PURPLE: Color = Color::named("purple", 127, 0, 255);
pub const PINK: Color = Color::named("pink", 255, 0, 255);
pub const RED_PINK: Color = Color::named("red-pink", 255, 0, 127);

/// The hue wheel in order, used by every ambient mode.
pub const BASE_COLORS: [Color; 12] = [
    RED,
    ORANGE,
    YELLOW,
    YELLOW_GREEN,
    GREEN,
    TEAL_GREEN,
    TEAL,
    LIGHT_BLUE,
    BLUE,
    PURPLE,
    PINK,
    RED_PINK,
];

/// A fixed, ordered set of named colors.
///
/// Order only matters to rotating selections; random draws treat it as a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Color>,
}

impl Default for Palette {
    fn default() -> Self {
        Self::base()
    }
}

impl Palette {
    /// Returns `None` for an empty list; every selection needs at least one color.
    pub fn new(colors: Vec<Color>) -> Option<Self> {
        if colors.is_empty() {
            None
        } else {
            Some(Palette { colors })
        }
    }

    pub fn base() -> Self {
        Palette {
            colors: BASE_COLORS.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// Color at `index`, wrapping around the end of the palette.
    pub fn wrapping(&self, index: usize) -> Color {
        self.colors[index % self.colors.len()]
    }
}

impl Index<usize> for Palette {
    type Output = Color;

    fn index(&self, index: usize) -> &Self::Output {
        &self.colors[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_palette_is_full_brightness() {
        let palette = Palette::base();
        assert_eq!(palette.len(), 12);
        assert!(palette.colors().iter().all(|c| c.brightness == 100));
    }

    #[test]
    fn test_wrapping_index() {
        let palette = Palette::base();
        assert_eq!(palette.wrapping(0), RED);
        assert_eq!(palette.wrapping(12), RED);
        assert_eq!(palette.wrapping(13), ORANGE);
    }

    #[test]
    fn test_empty_palette_rejected() {
        assert!(Palette::new(Vec::new()).is_none());
    }
}
