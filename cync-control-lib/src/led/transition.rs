use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::client::DeviceClient;
use crate::led::color::{Color, MAX_BRIGHTNESS};

/// Step count and pacing shared by every ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransitionSettings {
    pub steps: u32,
    #[serde(with = "crate::controller::settings::millis")]
    pub delay: Duration,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        TransitionSettings {
            steps: 10,
            delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Default)]
struct BarrierState {
    pending: AtomicUsize,
    notify: Notify,
}

/// Counts in-flight tasks; [`CompletionBarrier::wait`] resolves once all have finished.
///
/// Each task holds a [`BarrierGuard`] taken before it is spawned. Dropping the guard,
/// also on panic, marks the task done.
#[derive(Debug, Clone, Default)]
pub struct CompletionBarrier {
    state: Arc<BarrierState>,
}

#[derive(Debug)]
pub struct BarrierGuard {
    state: Arc<BarrierState>,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> BarrierGuard {
        self.state.pending.fetch_add(1, Ordering::SeqCst);
        BarrierGuard {
            state: Arc::clone(&self.state),
        }
    }

    pub fn pending(&self) -> usize {
        self.state.pending.load(Ordering::SeqCst)
    }

    pub async fn wait(&self) {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for BarrierGuard {
    fn drop(&mut self) {
        if self.state.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.state.notify.notify_waiters();
        }
    }
}

/// Brightness for step `step` (1-based) of a ramp from `from` to `to`.
pub fn brightness_step(from: u8, to: u8, step: u32) -> u8 {
    let (from, to) = (i64::from(from), i64::from(to));
    let level = to + (from - to) / i64::from(step.max(1));
    level.clamp(0, i64::from(MAX_BRIGHTNESS)) as u8
}

fn channel_step(current: u8, target: u8, remaining: u32) -> u8 {
    let (current, target) = (i64::from(current), i64::from(target));
    let next = current + (target - current) / i64::from(remaining.max(1));
    next.clamp(0, 255) as u8
}

/// Next color of a ramp with `remaining` steps left, including this one.
pub fn color_step(current: &Color, target: &Color, remaining: u32) -> Color {
    Color::new(
        channel_step(current.red, target.red, remaining),
        channel_step(current.green, target.green, remaining),
        channel_step(current.blue, target.blue, remaining),
        target.brightness,
    )
}

/// Issues one brightness call per step, then sets `final_color`.
///
/// Failed calls are logged and the ramp carries on. Returns `final_color`.
pub async fn ramp_brightness(
    client: &dyn DeviceClient,
    device_id: &str,
    from: u8,
    to: u8,
    final_color: Color,
    settings: TransitionSettings,
) -> Color {
    let steps = settings.steps.max(1);
    for step in 1..=steps {
        let level = brightness_step(from, to, step);
        debug!("{} brightness step {}/{}: {}", device_id, step, steps, level);
        if let Err(err) = client.set_brightness(device_id, level).await {
            warn!("brightness step for {} failed: {:#}", device_id, err);
        }
        sleep(settings.delay).await;
    }
    let (red, green, blue) = final_color.rgb();
    if let Err(err) = client.set_color(device_id, red, green, blue).await {
        warn!("final color for {} failed: {:#}", device_id, err);
    }
    final_color
}

/// Walks the color from `from` to `to`, closing an equal share of the gap each step.
///
/// Stops as soon as a step reaches `to`. A step that rounds down to black while `to` is
/// not black is replaced by `to` itself, so every ramp sends at least one color. Returns
/// the last color sent.
pub async fn ramp_color(
    client: &dyn DeviceClient,
    device_id: &str,
    from: Color,
    to: Color,
    settings: TransitionSettings,
) -> Color {
    let steps = settings.steps.max(1);
    let mut current = from;
    for step in 1..=steps {
        let mut next = color_step(&current, &to, steps - step + 1);
        if next.is_black() && !to.is_black() {
            debug!("{} ramp hit black at step {}, jumping to target", device_id, step);
            next = to;
        }
        let (red, green, blue) = next.rgb();
        if let Err(err) = client.set_color(device_id, red, green, blue).await {
            warn!("color step for {} failed: {:#}", device_id, err);
        }
        if next.rgb() == to.rgb() {
            return to;
        }
        current = next;
        if step < steps {
            sleep(settings.delay).await;
        }
    }
    current
}

/// Fans ramps out to one task per device and collects their final colors.
pub struct TransitionEngine {
    client: Arc<dyn DeviceClient>,
    settings: TransitionSettings,
    barrier: CompletionBarrier,
    finished_tx: mpsc::UnboundedSender<(String, Color)>,
    finished_rx: mpsc::UnboundedReceiver<(String, Color)>,
}

impl TransitionEngine {
    pub fn new(client: Arc<dyn DeviceClient>, settings: TransitionSettings) -> Self {
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        TransitionEngine {
            client,
            settings,
            barrier: CompletionBarrier::new(),
            finished_tx,
            finished_rx,
        }
    }

    pub fn settings(&self) -> TransitionSettings {
        self.settings
    }

    /// Tasks spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.barrier.pending()
    }

    pub fn spawn_color(&self, device_id: &str, from: Color, to: Color) -> JoinHandle<()> {
        let guard = self.barrier.enter();
        let client = Arc::clone(&self.client);
        let finished = self.finished_tx.clone();
        let settings = self.settings;
        let device_id = device_id.to_string();
        tokio::spawn(async move {
            let reached = ramp_color(client.as_ref(), &device_id, from, to, settings).await;
            let _ = finished.send((device_id, reached));
            drop(guard);
        })
    }

    pub fn spawn_brightness(
        &self,
        device_id: &str,
        from: u8,
        to: u8,
        final_color: Color,
    ) -> JoinHandle<()> {
        let guard = self.barrier.enter();
        let client = Arc::clone(&self.client);
        let finished = self.finished_tx.clone();
        let settings = self.settings;
        let device_id = device_id.to_string();
        tokio::spawn(async move {
            let reached =
                ramp_brightness(client.as_ref(), &device_id, from, to, final_color, settings)
                    .await;
            let _ = finished.send((device_id, reached));
            drop(guard);
        })
    }

    /// Waits for every spawned ramp, then returns their final colors in completion order.
    pub async fn wait(&mut self) -> Vec<(String, Color)> {
        self.barrier.wait().await;
        let mut finished = Vec::new();
        while let Ok(entry) = self.finished_rx.try_recv() {
            finished.push(entry);
        }
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Call, SimulatedClient};
    use crate::led::palette::{BLUE, RED};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn quick(steps: u32) -> TransitionSettings {
        TransitionSettings {
            steps,
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_brightness_ramp_issues_steps_then_color() {
        for steps in 1..=6 {
            let client = SimulatedClient::with_lights(1);
            let reached = ramp_brightness(&client, "0001", 80, 20, BLUE, quick(steps)).await;
            let calls = client.calls();
            assert_eq!(calls.len(), steps as usize + 1);
            assert!(calls[..steps as usize]
                .iter()
                .all(|c| matches!(c, Call::Brightness { .. })));
            assert_eq!(
                calls.last(),
                Some(&Call::Color {
                    device: "0001".into(),
                    rgb: BLUE.rgb()
                })
            );
            assert_eq!(reached, BLUE);
        }
    }

    #[tokio::test]
    async fn test_brightness_ramp_to_zero() {
        let client = SimulatedClient::with_lights(1);
        ramp_brightness(&client, "0001", 90, 0, RED, quick(3)).await;
        let levels: Vec<u8> = client
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::Brightness { level, .. } => Some(*level),
                _ => None,
            })
            .collect();
        assert_eq!(levels, vec![90, 45, 30]);
        assert_eq!(
            client.calls()[3],
            Call::Color {
                device: "0001".into(),
                rgb: RED.rgb()
            }
        );
    }

    #[tokio::test]
    async fn test_color_ramp_bounded_and_never_black() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let from = Color::new(rng.gen(), rng.gen(), rng.gen(), 100);
            let to = if rng.gen_bool(0.1) {
                Color::new(0, 0, 0, 100)
            } else {
                Color::new(rng.gen(), rng.gen(), rng.gen(), 100)
            };
            let steps = rng.gen_range(1..=8);
            let client = SimulatedClient::with_lights(1);
            let reached = ramp_color(&client, "0001", from, to, quick(steps)).await;
            let calls = client.calls();
            assert!(!calls.is_empty());
            assert!(calls.len() <= steps as usize);
            for call in &calls {
                if let Call::Color { rgb, .. } = call {
                    assert!(*rgb != (0, 0, 0) || to.is_black());
                }
            }
            assert_eq!(
                calls.last(),
                Some(&Call::Color {
                    device: "0001".into(),
                    rgb: reached.rgb()
                })
            );
            assert_eq!(reached.rgb(), to.rgb());
        }
    }

    #[tokio::test]
    async fn test_color_ramp_stops_at_target() {
        let client = SimulatedClient::with_lights(1);
        let reached = ramp_color(&client, "0001", RED, RED, quick(5)).await;
        assert_eq!(client.calls().len(), 1);
        assert_eq!(reached, RED);
    }

    #[tokio::test]
    async fn test_color_ramp_jumps_over_black_step() {
        // the first of two steps from black toward (0,0,1) rounds down to black
        let client = SimulatedClient::with_lights(1);
        let from = Color::new(0, 0, 0, 100);
        let to = Color::new(0, 0, 1, 100);
        let reached = ramp_color(&client, "0001", from, to, quick(2)).await;
        assert_eq!(reached, to);
        assert_eq!(
            client.calls(),
            vec![Call::Color {
                device: "0001".into(),
                rgb: (0, 0, 1)
            }]
        );
    }

    #[tokio::test]
    async fn test_long_color_ramp_from_black_sends_target() {
        let client = SimulatedClient::with_lights(1);
        let reached = ramp_color(&client, "0001", Color::new(0, 0, 0, 100), RED, quick(300)).await;
        assert_eq!(reached, RED);
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_barrier_waits_for_all_devices() {
        let client =
            Arc::new(SimulatedClient::with_lights(4).with_latency(Duration::from_millis(5)));
        let mut engine = TransitionEngine::new(client.clone(), quick(3));
        for id in ["0001", "0002", "0003", "0004"] {
            engine.spawn_color(id, RED, BLUE);
        }
        assert_eq!(engine.in_flight(), 4);
        let finished = engine.wait().await;
        assert_eq!(engine.in_flight(), 0);
        assert_eq!(finished.len(), 4);
        assert!(finished.iter().all(|(_, color)| *color == BLUE));
        assert_eq!(client.calls().len(), 12);
    }

    #[tokio::test]
    async fn test_barrier_with_nothing_spawned() {
        let barrier = CompletionBarrier::new();
        barrier.wait().await;
        let guard = barrier.enter();
        assert_eq!(barrier.pending(), 1);
        drop(guard);
        barrier.wait().await;
    }
}
