//! `nev-gcs` – ground-control station for a teleoperated vehicle.
//!
//! 1. Initialises logging (and OTLP export when configured).
//! 2. Loads `~/.nev-gcs/config.toml`, falling back to defaults.
//! 3. Wires the vehicle link, the state-owning station, the joystick driver
//!    and the cockpit server.
//! 4. On **Ctrl-C**, releases them in reverse order of acquisition.

mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use gcs_cockpit::CockpitServer;
use gcs_hal::{InputHandle, JoystickConfig};
use gcs_kernel::{SharedState, StoreHandle, Validator, job_queue};
use gcs_middleware::{CommandLink, open_link};
use gcs_runtime::{Dispatcher, OperatorCommands, Station};
use gcs_types::GcsError;
use tokio::sync::Notify;
use tracing::{error, info, warn};

const INPUT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> ExitCode {
    let _telemetry = gcs_runtime::init_tracing("nev-gcs");

    print_banner();

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            println!(
                "  No config at {}, using defaults.",
                config::config_path().display().to_string().dimmed()
            );
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    match start(cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "station failed to start");
            println!("{}: {}", "Startup failed".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Build the async runtime and run the station until Ctrl-C.
fn start(cfg: config::Config) -> Result<(), GcsError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| GcsError::Channel(format!("failed to start async runtime: {e}")))?;
    runtime.block_on(run(cfg))
}

async fn run(cfg: config::Config) -> Result<(), GcsError> {
    // ── Store, link, station ──────────────────────────────────────────────
    let (store, inbox) = job_queue();
    let state = SharedState::new(Validator::with_builtin_rules(&cfg.validation));

    let link = Arc::new(open_link(&cfg.link, store.clone())?);
    info!(
        transport = ?cfg.link.transport,
        codec = link.codec_name(),
        vehicle = %cfg.link.vehicle_addr,
        "vehicle link open"
    );
    let command_link: Arc<dyn CommandLink> = link.clone();

    let dispatcher = Dispatcher::new(&cfg.dispatch, Arc::clone(&command_link));
    let (station, station_handle) = Station::with_queue(
        state,
        store.clone(),
        inbox,
        dispatcher,
        cfg.dispatch.tick_interval(),
    );
    let station_task = tokio::spawn(station.run());

    // ── Operator input ────────────────────────────────────────────────────
    let input = start_input(&cfg.joystick, store.clone(), Arc::clone(&command_link));

    // ── Cockpit ───────────────────────────────────────────────────────────
    let commands = OperatorCommands::new(store, command_link);
    let cockpit = CockpitServer::new(commands, cfg.cockpit.clone());
    println!(
        "  Cockpit on {}",
        format!("http://localhost:{}/api/state", cockpit.port()).bold()
    );
    let cockpit_task = tokio::spawn(async move {
        if let Err(e) = cockpit.run().await {
            error!(error = %e, "cockpit unavailable");
        }
    });

    // ── Ctrl-C ────────────────────────────────────────────────────────────
    let shutdown = Arc::new(Notify::new());
    let on_signal = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        on_signal.notify_one();
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    println!("  {} Press Ctrl-C to stop.\n", "Station running.".green().bold());
    shutdown.notified().await;

    // ── Shutdown, reverse order ───────────────────────────────────────────
    cockpit_task.abort();
    info!("cockpit stopped");

    if let Some(mut input) = input {
        let joined = tokio::task::spawn_blocking(move || input.stop(INPUT_STOP_TIMEOUT)).await;
        if let Err(e) = joined {
            warn!(error = %e, "input driver stop task failed");
        }
    }

    link.close();
    info!("vehicle link closed");

    station_handle.shutdown();
    if let Err(e) = station_task.await {
        warn!(error = %e, "station task ended abnormally");
    }

    println!("{}", "  ✓ Shutdown complete.".green());
    Ok(())
}

#[cfg(feature = "gamepad")]
fn start_input(
    config: &JoystickConfig,
    store: StoreHandle,
    link: Arc<dyn CommandLink>,
) -> Option<InputHandle> {
    match gcs_hal::spawn(gcs_hal::GilrsBackend::new, config.clone(), store, link) {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!(error = %e, "joystick driver not started");
            None
        }
    }
}

#[cfg(not(feature = "gamepad"))]
fn start_input(
    _config: &JoystickConfig,
    _store: StoreHandle,
    _link: Arc<dyn CommandLink>,
) -> Option<InputHandle> {
    warn!("built without the `gamepad` feature, joystick input disabled");
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   _  _________   __  _________  ____"#.bold().cyan());
    println!("{}", r#"  / |/ / __/ | | / / / ___/ ___/ / __/"#.bold().cyan());
    println!("{}", r#" /    / _/ | |/ / / (_ / /__  _\ \  "#.bold().cyan());
    println!("{}", r#"/_/|_/___/ |___/  \___/\___/ /___/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "NEV GCS".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Ground-control station");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_link_address_is_returned_not_exited() {
        let mut cfg = config::Config::default();
        cfg.link.bind_addr = "not-an-address".to_string();
        let err = start(cfg).unwrap_err();
        assert!(matches!(err, GcsError::Config(_)));
        assert!(err.to_string().contains("bind_addr"));
    }
}
