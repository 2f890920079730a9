use std::time::Duration;

use crate::controller::Context;
use crate::error::{ControlError, Result};

const TICK: Duration = Duration::from_millis(1);

/// Reads and executes one operator command per tick.
#[derive(Debug, Default)]
pub struct CommandMode;

impl CommandMode {
    pub fn on_switch(&mut self, _ctx: &mut Context) {
        println!("type 'help' for a list of commands");
    }

    pub async fn run(&mut self, ctx: &mut Context) -> Result<Duration> {
        let Some(line) = ctx.console().prompt("command", "enter a command").await? else {
            println!();
            println!("input closed, exiting");
            ctx.stop();
            return Ok(TICK);
        };
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(TICK);
        };
        let command = command.to_lowercase();

        match command.as_str() {
            "help" | "h" => print_help(ctx),
            "on" | "turnon" => switch_all(ctx, true).await,
            "off" | "turnoff" => switch_all(ctx, false).await,
            "printdevices" => ctx.print_devices(),
            "modes" | "listmodes" => {
                for id in ctx.mode_ids() {
                    println!("  {}", id);
                }
            }
            "refresh" => match ctx.refresh_device_cache().await {
                Ok(()) => println!("found {} devices", ctx.devices().len()),
                Err(err) => println!("{}", err),
            },
            "switchmode" => match words.next() {
                Some(id) => request_mode(ctx, id)?,
                None => println!("usage: switchmode <mode>"),
            },
            "exit" => {
                println!("exiting");
                ctx.stop();
            }
            id if ctx.has_mode(id) => request_mode(ctx, id)?,
            other => println!("unrecognized command {}", other),
        }
        Ok(TICK)
    }
}

/// Queues the switch, or reports an unknown id and hands it back to the controller.
fn request_mode(ctx: &mut Context, id: &str) -> Result<()> {
    if !ctx.has_mode(id) {
        let err = ControlError::UnknownMode(id.to_string());
        println!("{}", err);
        return Err(err);
    }
    ctx.request_switch(id);
    Ok(())
}

async fn switch_all(ctx: &mut Context, on: bool) {
    let ids: Vec<String> = ctx.devices().iter().map(|d| d.id.clone()).collect();
    let mut failed = 0;
    for id in &ids {
        if let Err(err) = ctx.set_status(id, on).await {
            println!("{}", err);
            failed += 1;
        }
    }
    println!(
        "turned {} {} of {} devices",
        if on { "on" } else { "off" },
        ids.len() - failed,
        ids.len()
    );
}

fn print_help(ctx: &Context) {
    println!("commands:");
    println!("  help, h              show this list");
    println!("  on, turnon           switch every device on");
    println!("  off, turnoff         switch every device off");
    println!("  printdevices         show the cached devices");
    println!("  refresh              fetch the device list again");
    println!("  modes, listmodes     list the available modes");
    println!("  switchmode <mode>    change to another mode");
    println!("  exit                 quit");
    println!("any mode name also switches to it: {}", ctx.mode_ids().join(", "));
}
