use std::collections::HashMap;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::led::color::Color;
use crate::led::palette::Palette;

/// Default number of draws per device before a conflicting color is accepted anyway.
pub const DEFAULT_ATTEMPTS: usize = 1000;

/// Where palette indices come from.
pub trait ColorSource {
    /// Returns an index in `0..len`. `len` is never zero.
    fn draw(&mut self, len: usize) -> usize;
}

/// Uniform draws from any [`Rng`].
pub struct RandomSource<R>(pub R);

impl RandomSource<StdRng> {
    pub fn from_entropy() -> Self {
        RandomSource(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        RandomSource(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ColorSource for RandomSource<R> {
    fn draw(&mut self, len: usize) -> usize {
        self.0.gen_range(0..len)
    }
}

/// Replays a fixed list of indices, cycling when it runs out.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    draws: Vec<usize>,
    position: usize,
}

impl ScriptedSource {
    pub fn new(draws: Vec<usize>) -> Self {
        ScriptedSource { draws, position: 0 }
    }

    /// How many indices have been handed out so far.
    pub fn drawn(&self) -> usize {
        self.position
    }
}

impl ColorSource for ScriptedSource {
    fn draw(&mut self, len: usize) -> usize {
        if self.draws.is_empty() {
            return 0;
        }
        let index = self.draws[self.position % self.draws.len()] % len;
        self.position += 1;
        index
    }
}

/// Picks one palette color per device.
///
/// Best effort: a device should not keep the color it had last round, and no two devices
/// should share a color within one round. When the attempt budget runs out the last
/// candidate is taken regardless, so assignment never blocks.
#[derive(Debug, Clone, Copy)]
pub struct ColorAssigner {
    attempts: usize,
}

impl Default for ColorAssigner {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPTS)
    }
}

impl ColorAssigner {
    pub fn new(attempts: usize) -> Self {
        ColorAssigner {
            attempts: attempts.max(1),
        }
    }

    /// Returns `(device id, color)` pairs in the order the ids were given.
    ///
    /// `last_colors` is only read; recording the applied color is up to the caller.
    pub fn assign<'a, S>(
        &self,
        palette: &Palette,
        device_ids: impl IntoIterator<Item = &'a str>,
        last_colors: &HashMap<String, Color>,
        source: &mut S,
    ) -> Vec<(String, Color)>
    where
        S: ColorSource + ?Sized,
    {
        let mut out: Vec<(String, Color)> = Vec::new();
        for device_id in device_ids {
            let last = last_colors.get(device_id);
            let mut candidate = palette[source.draw(palette.len())];
            let mut attempt = 1;
            while !self.acceptable(&candidate, last, &out) && attempt < self.attempts {
                candidate = palette[source.draw(palette.len())];
                attempt += 1;
            }
            if !self.acceptable(&candidate, last, &out) {
                debug!(
                    "no conforming color for {} after {} draws, using {}",
                    device_id,
                    attempt,
                    candidate.display_name()
                );
            }
            out.push((device_id.to_string(), candidate));
        }
        out
    }

    fn acceptable(
        &self,
        candidate: &Color,
        last: Option<&Color>,
        claimed: &[(String, Color)],
    ) -> bool {
        if last.is_some_and(|last| last.same_light(candidate)) {
            return false;
        }
        !claimed.iter().any(|(_, color)| color.same_light(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::palette::{BLUE, GREEN, RED};

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("device-{}", i)).collect()
    }

    #[test]
    fn test_retries_claimed_color() {
        let palette = Palette::new(vec![RED, GREEN]).unwrap();
        let devices = ids(2);
        let mut source = ScriptedSource::new(vec![0, 0, 1]);
        let assigned = ColorAssigner::default().assign(
            &palette,
            devices.iter().map(String::as_str),
            &HashMap::new(),
            &mut source,
        );
        assert_eq!(
            assigned,
            vec![("device-0".to_string(), RED), ("device-1".to_string(), GREEN)]
        );
        assert_eq!(source.drawn(), 3);
    }

    #[test]
    fn test_distinct_colors_when_palette_is_large_enough() {
        let palette = Palette::base();
        for seed in 0..50 {
            let devices = ids(palette.len());
            let mut source = RandomSource::seeded(seed);
            let assigned = ColorAssigner::default().assign(
                &palette,
                devices.iter().map(String::as_str),
                &HashMap::new(),
                &mut source,
            );
            for (i, (_, a)) in assigned.iter().enumerate() {
                for (_, b) in assigned.iter().skip(i + 1) {
                    assert_ne!(a, b, "seed {} produced a duplicate", seed);
                }
            }
        }
    }

    #[test]
    fn test_never_repeats_last_color() {
        let palette = Palette::new(vec![RED, GREEN, BLUE]).unwrap();
        let devices = ids(2);
        let mut last: HashMap<String, Color> = HashMap::new();
        let mut source = RandomSource::seeded(7);
        for _ in 0..100 {
            let assigned = ColorAssigner::default().assign(
                &palette,
                devices.iter().map(String::as_str),
                &last,
                &mut source,
            );
            for (id, color) in assigned {
                if let Some(previous) = last.get(&id) {
                    assert_ne!(*previous, color);
                }
                last.insert(id, color);
            }
        }
    }

    #[test]
    fn test_exhausted_budget_accepts_last_draw() {
        let palette = Palette::new(vec![RED]).unwrap();
        let devices = ids(2);
        let mut source = ScriptedSource::new(vec![0]);
        let assigned = ColorAssigner::new(5).assign(
            &palette,
            devices.iter().map(String::as_str),
            &HashMap::new(),
            &mut source,
        );
        assert_eq!(assigned[0].1, RED);
        assert_eq!(assigned[1].1, RED);
        // one draw for the first device, the full budget for the second
        assert_eq!(source.drawn(), 6);
    }
}
