use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use log::{info, LevelFilter};

use cync_control_lib::client::session::SESSION_ENV;
use cync_control_lib::client::{Authenticator, HttpClient, SessionInfo, SimulatedClient};
use cync_control_lib::controller::{Console, Controller, ControllerSettings};
use cync_control_lib::mode::COMMAND;
use cync_control_lib::{ControlError, DeviceClient};

const EXIT_USAGE: i32 = 1;
const EXIT_LOGIN: i32 = 2;
const EXIT_CONTROLLER: i32 = 3;
const EXIT_SWITCH: i32 = 4;
const EXIT_SESSION: i32 = 5;
const EXIT_TICKS: i32 = 100;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    // exit directly: a pending stdin read would otherwise hold up runtime shutdown
    let code = match handle_cli(cli).await {
        Ok(()) => 0,
        Err(exit) => {
            eprintln!("error: {:#}", exit.error);
            exit.code
        }
    };
    process::exit(code);
}

/// This struct defines the command line interface of the application
#[derive(Parser)]
#[clap(
    name = "cync_control",
    about = "Cycles colors across networked lights",
    version
)]
pub struct Cli {
    /// Account email, used when no cached session is available
    #[clap(env = "CYNC_USER")]
    pub user: Option<String>,

    /// Account password
    #[clap(env = "CYNC_PASS", hide_env_values = true)]
    pub password: Option<String>,

    /// Log debug output from the controller
    #[clap(long)]
    pub debug: bool,

    /// Base URL of a JSON device gateway, required unless simulating
    #[clap(long, env = "CYNC_GATEWAY", required_unless_present = "simulate")]
    pub gateway: Option<String>,

    /// Drive this many in-memory lights instead of real devices
    #[clap(long, value_name = "COUNT")]
    pub simulate: Option<usize>,

    /// JSON file with controller timings
    #[clap(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Consecutive failed ticks before giving up
    #[clap(long, default_value_t = 5)]
    pub max_tick_failures: usize,

    /// How long indefinite modes wait for input each tick, in milliseconds
    #[clap(long, value_name = "MS")]
    pub input_window: Option<u64>,

    /// Steps per color or brightness transition
    #[clap(long)]
    pub transition_steps: Option<u32>,

    /// Give up on a gateway request after this many milliseconds
    #[clap(long, value_name = "MS")]
    pub request_timeout: Option<u64>,
}

/// A failure and the process exit code it maps to.
struct Exit {
    code: i32,
    error: anyhow::Error,
}

impl Exit {
    fn new(code: i32, error: impl Into<anyhow::Error>) -> Self {
        Exit {
            code,
            error: error.into(),
        }
    }
}

fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if debug {
        builder
            .filter_module("cync_control", LevelFilter::Debug)
            .filter_module("cync_control_lib", LevelFilter::Debug);
    }
    builder.init();
}

fn load_settings(cli: &Cli) -> anyhow::Result<ControllerSettings> {
    let mut settings = match &cli.settings {
        Some(path) => ControllerSettings::from_json_file(path)?,
        None => ControllerSettings::default(),
    };
    if let Some(ms) = cli.input_window {
        settings.input_window = Duration::from_millis(ms);
    }
    if let Some(steps) = cli.transition_steps {
        settings.transition.steps = steps;
    }
    if let Some(ms) = cli.request_timeout {
        settings.request_timeout = Duration::from_millis(ms);
    }
    Ok(settings)
}

async fn handle_cli(cli: Cli) -> Result<(), Exit> {
    let settings = load_settings(&cli).map_err(|e| Exit::new(EXIT_USAGE, e))?;
    let console = Console::stdin();
    let client = connect(&cli, &console, settings.request_timeout).await?;

    let mut controller = Controller::new(client, console, settings)
        .await
        .map_err(|e| Exit::new(EXIT_CONTROLLER, e))?;
    controller
        .switch_mode(COMMAND)
        .await
        .map_err(|e| Exit::new(EXIT_SWITCH, e))?;
    controller
        .run(cli.max_tick_failures.max(1))
        .await
        .map_err(|e| Exit::new(EXIT_TICKS, e))?;

    info!("controller stopped");
    Ok(())
}

async fn connect(
    cli: &Cli,
    console: &Console,
    timeout: Duration,
) -> Result<Arc<dyn DeviceClient>, Exit> {
    if let Some(count) = cli.simulate {
        println!("Simulating {} lights", count);
        return Ok(Arc::new(SimulatedClient::with_lights(count)));
    }
    let gateway = cli
        .gateway
        .as_deref()
        .ok_or_else(|| Exit::new(EXIT_USAGE, anyhow!("pass --gateway or set CYNC_GATEWAY")))?;

    let session = match std::env::var(SESSION_ENV) {
        Ok(raw) if !raw.trim().is_empty() => {
            SessionInfo::from_json(&raw).map_err(|e| Exit::new(EXIT_SESSION, e))?
        }
        _ => login(cli, console, gateway, timeout)
            .await
            .map_err(|e| Exit::new(EXIT_LOGIN, e))?,
    };
    info!("using session for user {} at {}", session.user_id, gateway);
    let client =
        HttpClient::new(gateway, session, timeout).map_err(|e| Exit::new(EXIT_USAGE, e))?;
    Ok(Arc::new(client))
}

async fn login(
    cli: &Cli,
    console: &Console,
    gateway: &str,
    timeout: Duration,
) -> cync_control_lib::Result<SessionInfo> {
    let user = cli
        .user
        .as_deref()
        .ok_or_else(|| ControlError::Login(anyhow!("no user given, pass one or set CYNC_USER")))?;
    let password = cli.password.as_deref().ok_or_else(|| {
        ControlError::Login(anyhow!("no password given, pass one or set CYNC_PASS"))
    })?;

    let auth = Authenticator::new(gateway, timeout).map_err(ControlError::Login)?;
    auth.request_code(user).await.map_err(ControlError::Login)?;
    let code = console
        .prompt("login", &format!("Verification code sent to {}", user))
        .await?
        .ok_or_else(|| ControlError::Login(anyhow!("no verification code entered")))?;
    let session = auth
        .verify(user, password, &code)
        .await
        .map_err(ControlError::Login)?;

    println!("Logged in. Set {} to skip the code next time:", SESSION_ENV);
    println!("{}", session.to_json()?);
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::parse_from([
            "cync_control",
            "--simulate",
            "3",
            "--input-window",
            "200",
            "--transition-steps",
            "4",
        ]);
        let settings = load_settings(&cli).unwrap();
        assert_eq!(cli.simulate, Some(3));
        assert_eq!(settings.input_window, Duration::from_millis(200));
        assert_eq!(settings.transition.steps, 4);
        assert_eq!(settings.stale_after, Duration::from_secs(30));
        assert_eq!(settings.request_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_gateway_required_without_simulation() {
        assert!(Cli::try_parse_from(["cync_control"]).is_err());

        let cli =
            Cli::try_parse_from(["cync_control", "--gateway", "http://localhost:8080"]).unwrap();
        assert_eq!(cli.gateway.as_deref(), Some("http://localhost:8080"));

        let cli = Cli::try_parse_from(["cync_control", "--simulate", "2"]).unwrap();
        assert_eq!(cli.gateway, None);
    }

    #[test]
    fn test_request_timeout_flag() {
        let cli = Cli::parse_from(["cync_control", "--simulate", "1", "--request-timeout", "500"]);
        let settings = load_settings(&cli).unwrap();
        assert_eq!(settings.request_timeout, Duration::from_millis(500));
    }
}
