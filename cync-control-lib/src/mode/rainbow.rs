use std::time::Duration;

use tokio::time::sleep;

use crate::controller::Context;
use crate::error::Result;
use crate::mode::{device_name, print_row, refresh_when_stale};

/// Gives every device a fresh random palette color each tick.
#[derive(Debug, Default)]
pub struct RainbowMode;

impl RainbowMode {
    pub async fn run(&mut self, ctx: &mut Context) -> Result<Duration> {
        refresh_when_stale(ctx).await;
        let delay = ctx.settings().device_delay;

        let assignments = ctx.assign_colors();
        for (device_id, color) in assignments {
            ctx.set_color_detached(&device_id, color);
            print_row(&device_name(ctx, &device_id), &color);
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }
        Ok(ctx.settings().rainbow_interval)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::client::{Call, SimulatedClient};
    use crate::controller::{Console, Controller, ControllerSettings};
    use crate::led::assign::RandomSource;
    use crate::mode::RAINBOW;

    #[tokio::test]
    async fn test_rainbow_tick_colors_every_device() {
        let client = Arc::new(SimulatedClient::with_lights(5));
        let mut controller = Controller::new(
            client.clone(),
            Console::scripted(Vec::<String>::new()),
            ControllerSettings::immediate(),
        )
        .await
        .unwrap()
        .with_color_source(RandomSource::seeded(3));
        controller.switch_mode(RAINBOW).await.unwrap();

        let mut previous = controller.context().last_colors().clone();
        for _ in 0..5 {
            controller.tick().await.unwrap();
            tokio::task::yield_now().await;
            let current = controller.context().last_colors().clone();
            assert_eq!(current.len(), 5);
            for (id, color) in &current {
                if let Some(before) = previous.get(id) {
                    assert!(!before.same_light(color), "{} kept its color", id);
                }
            }
            let mut distinct: Vec<_> = current.values().map(|c| c.rgb()).collect();
            distinct.sort_unstable();
            distinct.dedup();
            assert_eq!(distinct.len(), 5);
            previous = current;
        }

        // detached calls land eventually
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let colored = client
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Color { .. }))
            .count();
        assert_eq!(colored, 25);
    }
}
