//! axishud - single-switch axis scanning overlay
//!
//! Headless demo of the overlay host. There is no window system behind it:
//! the overlay is drawn into memory and the switch is the Enter key.
//!
//! # Execution Flow
//!
//! 1. Load [`HostSettings`] from `axishud.yaml` (or the path given as first
//!    argument) and `AXISHUD_*` variables
//! 2. Initialize logging → `<log_dir>/<log_prefix>.<date>`
//! 3. Create the tokio runtime the host task and tap workers run on
//! 4. Load the scan configuration from the [`ConfigurationStore`]
//! 5. Attach a [`ServiceConnection`] and read commands from stdin
//!
//! # Commands
//!
//! - empty line: switch activation
//! - `hold`: long activation (aborts scanning)
//! - `pause`, `reset`, `show`, `hide`, `status`
//! - `color #rrggbb`: recolour the bars
//! - `save <id>`: store the current configuration under `<id>`
//! - `quit`

use anyhow::{Context, Result};
use axishud::binding::{ConnectionListener, LocalHostProvider, ServiceConnection};
use axishud::config::{ConfigurationStore, HostSettings};
use axishud::models::{Configuration, Extent};
use axishud::overlay::{Color, HeadlessBackend, HeadlessHandle, SurfaceBackend};
use axishud::services::TapInjector;
use axishud::{APP_NAME, VERSION};
use camino::Utf8PathBuf;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

struct LoggingConnectionListener;

impl ConnectionListener for LoggingConnectionListener {
    fn on_attached(&self) {
        tracing::info!("Attached to overlay host");
    }

    fn on_detached(&self) {
        tracing::warn!("Detached from overlay host");
        println!("detached (type 'quit' to exit)");
    }
}

fn main() -> Result<()> {
    let settings_path = std::env::args()
        .nth(1)
        .map(Utf8PathBuf::from)
        .unwrap_or_else(|| Utf8PathBuf::from("axishud.yaml"));
    let settings = HostSettings::load(Some(&settings_path))?;

    let _log_guard = axishud::logging::setup_from_settings(&settings)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("axishud-worker")
        .build()
        .context("Failed to create tokio runtime")?;
    // Attach spawns its watcher on the ambient runtime.
    let enter_guard = runtime.enter();

    let mut store = ConfigurationStore::open(&settings.store_path)?;
    let configuration = initial_configuration(&store, settings.configuration_id);
    tracing::info!("Using {}", configuration);

    let display = Extent::new(settings.display_width, settings.display_height);
    let backend = HeadlessBackend::new(display);
    let screen = backend.handle();
    let provider = Arc::new(LocalHostProvider::new(
        runtime.handle().clone(),
        Box::new(move || Box::new(backend.clone()) as Box<dyn SurfaceBackend>),
        tap_injector(),
        settings.frame_interval(),
    ));

    let connection = ServiceConnection::new(provider.clone());
    connection.set_connection_listener(Arc::new(LoggingConnectionListener));
    connection.set_configuration(configuration)?;
    connection.attach().context("Failed to attach to overlay host")?;
    connection.set_color(settings.indicator_color()?);

    println!("{} v{} - Enter = switch, 'hold' = abort, 'quit' = exit", APP_NAME, VERSION);
    run_commands(&connection, &screen, &mut store)?;

    connection.detach();
    drop(enter_guard);
    runtime.shutdown_timeout(std::time::Duration::from_secs(2));
    provider.metrics().log_summary();
    tracing::info!("Shutdown complete");
    Ok(())
}

fn initial_configuration(store: &ConfigurationStore, id: Option<i64>) -> Configuration {
    let Some(id) = id else {
        return Configuration::default();
    };
    match store.find_by_id(id) {
        Some(conf) => conf.clone(),
        None => {
            tracing::warn!("No stored configuration with id {}, using defaults", id);
            Configuration::default()
        }
    }
}

#[cfg(feature = "enigo")]
fn tap_injector() -> Arc<dyn TapInjector> {
    Arc::new(axishud::services::EnigoInjector)
}

#[cfg(not(feature = "enigo"))]
fn tap_injector() -> Arc<dyn TapInjector> {
    Arc::new(axishud::services::LoggingInjector)
}

fn run_commands(
    connection: &ServiceConnection,
    screen: &HeadlessHandle,
    store: &mut ConfigurationStore,
) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let mut words = line.split_whitespace();

        match (words.next(), words.next()) {
            (None, _) => {
                if !screen.activate() {
                    println!("overlay not shown");
                }
            }
            (Some("hold"), _) => {
                if !screen.hold() {
                    println!("overlay not shown");
                }
            }
            (Some("pause"), _) => connection.pause_scanning(),
            (Some("reset"), _) => connection.reset_scanning(),
            (Some("show"), _) => connection.add_overlay_view(),
            (Some("hide"), _) => connection.remove_overlay_view(),
            (Some("status"), _) => match connection.status() {
                Some(status) => println!("{:?}", status),
                None => println!("not attached"),
            },
            (Some("color"), Some(hex)) => match hex.parse::<Color>() {
                Ok(color) => connection.set_color(color),
                Err(e) => println!("{}", e),
            },
            (Some("save"), Some(id)) => match id.parse::<i64>() {
                Ok(id) => save_current(connection, store, id)?,
                Err(_) => println!("invalid id: {}", id),
            },
            (Some("quit"), _) => break,
            (Some(other), _) => println!("unknown command: {}", other),
        }
        stdout.flush().context("Failed to flush stdout")?;
    }

    Ok(())
}

fn save_current(
    connection: &ServiceConnection,
    store: &mut ConfigurationStore,
    id: i64,
) -> Result<()> {
    let mut conf = connection.configuration().unwrap_or_default();
    conf.set_id(id);
    if let Err(e) = store.add(conf) {
        println!("{}", e);
        return Ok(());
    }
    store.save()?;
    println!("saved configuration {}", id);
    Ok(())
}
