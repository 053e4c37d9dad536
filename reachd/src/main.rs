//! Reachd - reaching-trial experiment runtime
//!
//! Connects to the planning peer, runs the configured number of reaching
//! trials against the terminal keyboard, and prints the per-trial completion
//! times when the session ends.
//!
//! Config location:
//! - Linux: ~/.config/reachd/config.json
//! - Windows: %APPDATA%\reachd\config.json
//! - MacOS: ~/Library/Application Support/reachd/config.json

use std::path::PathBuf;
use std::sync::Arc;

use reachgrid::render::Surface;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod controller;
mod display;
mod error;
mod keys;
mod paths;
mod service;
mod session;
mod transport;

use config::SessionConfig;
use controller::TrialContext;
use display::{NullSurface, TerminalSurface};
use keys::Keyboard;
use paths::AppPaths;
use service::HttpGameService;
use session::{Session, SessionEvent};
use transport::Transport;

fn config_arg() -> Result<Option<PathBuf>, String> {
    let mut args = std::env::args().skip(1);
    let mut path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let value = args.next().ok_or("--config needs a path")?;
                path = Some(PathBuf::from(value));
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
    }
    Ok(path)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let paths = AppPaths::new()?;
    let cfg = SessionConfig::load(config_arg()?.as_deref(), &paths)?;
    info!("Config directory: {:?}", paths.config_dir());
    info!(
        "Peer {} / service {} / {} trials on a {}x{} grid",
        cfg.peer_addr, cfg.service_url, cfg.total_trials, cfg.grid_number, cfg.grid_number
    );

    let (transport, _pump) = Transport::connect(&cfg.peer_addr).await;
    let keyboard = Keyboard::new();
    let _stdin = keys::spawn_stdin_reader(keyboard.clone(), transport.clone());

    // Leave cleanly on Ctrl-C; partial sessions are not recorded anywhere.
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C: session aborted");
            std::process::exit(130);
        }
    });

    let ctx = TrialContext {
        transport,
        service: Arc::new(HttpGameService::new(
            cfg.service_url.clone(),
            cfg.request_timeout(),
        )?),
        keyboard,
        params: cfg.planner(),
        grid_number: cfg.grid_number,
    };

    let mut terminal = TerminalSurface::new(cfg.grid_number);
    let mut headless = NullSurface;
    let surface: &mut dyn Surface = if cfg.render {
        info!("Move with the arrow words (up/down/left/right, wasd or hjkl) followed by Enter");
        &mut terminal
    } else {
        &mut headless
    };

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut session =
        Session::new(ctx, surface, cfg.total_trials, cfg.timings()).with_events(events_tx);

    // The event stream ends when the session (and its sender) is dropped.
    let (result, handed_off) = tokio::join!(async move { session.run().await }, async move {
        let mut handed_off = false;
        while let Some(event) = events_rx.recv().await {
            match event {
                SessionEvent::TrialRecorded(r) => info!("Trial {}: {} ms", r.index, r.duration_ms),
                SessionEvent::SessionComplete => {
                    info!("Reaching trials finished; handing off to the questionnaire");
                    handed_off = true;
                }
                other => debug!("{:?}", other),
            }
        }
        handed_off
    });

    let records = match result {
        Ok(records) => records,
        Err(e) => {
            error!("Session failed: {}", e);
            return Err(e.into());
        }
    };
    debug!("Questionnaire hand-off: {}", handed_off);
    println!("{}", serde_json::to_string_pretty(&records.summary())?);
    Ok(())
}
