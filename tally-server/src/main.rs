// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tally: access-logged HTTP/1.1 host
//
//  Architecture: monoio thread-per-core, one listener per worker
//  Logging:      one access line per request via the `access` target
//  Config:       standalone YAML + CLI overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tally_core::{Pipeline, TallyConfig};
use tally_observability::{AccessRecorder, logger};
use tally_server::routes::Routes;
use tally_server::worker::{self, SharedState};
use tracing::info;

/// Global shutdown flag, set by the signal handler.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Tally: access-logged HTTP/1.1 host")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/tally/tally.yaml")]
    config: PathBuf,

    /// Log level or EnvFilter directives
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Listen address, overrides `server.http_addr`
    #[arg(long)]
    listen: Option<String>,

    /// Access line template, overrides `access_log.format`
    #[arg(long)]
    format: Option<String>,

    /// Refuse to start when the access line template is invalid
    #[arg(long)]
    strict_format: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Tracing ──
    logger::init(&cli.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Tally starting");

    // ── Config ──
    let mut config = if cli.config.exists() {
        info!(path = %cli.config.display(), "Loading config file");
        TallyConfig::load(&cli.config)?
    } else {
        info!("No config file found, using defaults");
        TallyConfig::default()
    };
    if let Some(addr) = cli.listen {
        config.server.http_addr = addr;
    }
    if let Some(format) = cli.format {
        config.access_log.format = Some(format);
    }

    let num_workers = config.effective_workers();
    info!(workers = num_workers, "Worker count");

    // ── Pipeline: access recorder outermost ──
    let format = config.access_log.format.as_deref();
    let recorder = if cli.strict_format {
        AccessRecorder::try_new(format)
            .map_err(|e| anyhow::anyhow!("invalid access_log.format: {e}"))?
    } else {
        AccessRecorder::new(format)
    };
    let routes = Routes::standard()?;
    info!(routes = routes.len(), "Routes registered");
    let pipeline = Pipeline::new(Arc::new(routes)).with(Arc::new(recorder));

    // ── Spawn monoio worker threads ──
    let addr = config.server.http_addr.clone();
    let shared = SharedState::new(pipeline, config);
    let worker_handles = worker::spawn_workers(Arc::clone(&shared), num_workers)?;

    info!(workers = num_workers, addr = %addr, "Tally is ready, serving traffic");

    // ── Graceful shutdown: wait for SIGTERM/SIGINT ──
    setup_signal_handler();

    while !SHUTDOWN.load(Ordering::Relaxed) {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    info!("Shutdown signal received, stopping...");

    // Workers sit in an endless accept loop; process exit reaps them.
    drop(worker_handles);

    info!("Tally stopped");
    Ok(())
}

fn setup_signal_handler() {
    // SIGTERM (docker stop) + SIGINT (Ctrl+C)
    for sig in [libc::SIGTERM, libc::SIGINT] {
        unsafe {
            libc::signal(sig, signal_handler as libc::sighandler_t);
        }
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}
