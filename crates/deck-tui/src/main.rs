mod action;
mod app;
mod controller;
mod engine;
mod library;
mod render;
mod session;
mod terminal;
mod theme;
mod view;
mod visualizer;

use action::Screen;
use app::App;
use controller::PlaybackController;
use deck_proto::config::Config;
use deck_proto::platform;
use deck_proto::state::{PlaybackState, StateManager};
use engine::MpvLauncher;
use library::{Browser, Library};
use render::DiffRenderer;
use session::SessionEvent;
use std::path::PathBuf;
use std::sync::Arc;
use terminal::{CrosstermInput, CrosstermSurface, TerminalGuard};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("deck.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG overrides the default filter.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // The screen is taken over below, so point at the log first.
    eprintln!("deck log: {}", log_path.display());

    info!("deck starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = Config::load().unwrap_or_else(|e| {
        warn!("config: {:#}; using defaults", e);
        Config::default()
    });

    // ── Locate and probe mpv ─────────────────────────────────────────────────
    let Some(binary) = platform::find_mpv_binary(config.engine.binary.as_deref()) else {
        error!("engine: {} not found", platform::mpv_binary_name());
        print_engine_help(&format!("{} was not found", platform::mpv_binary_name()));
        std::process::exit(1);
    };
    match engine::probe_version(&binary, config.engine.probe_timeout()).await {
        Ok(version) => info!("engine: {:?} is {}", binary, version),
        Err(e) => {
            error!("engine: {}", e);
            print_engine_help(&e.to_string());
            std::process::exit(1);
        }
    }

    // ── Startup queue from the command line ──────────────────────────────────
    let library = Library::new(&config.library.extensions);
    let args: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    let tracks = library.resolve_args(&args);
    info!("queue: {} tracks from {} arguments", tracks.len(), args.len());

    // ── Playback core ────────────────────────────────────────────────────────
    let state = Arc::new(StateManager::new(PlaybackState::with_volume(
        config.player.default_volume,
    )));
    let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(64);
    let controller = PlaybackController::new(
        MpvLauncher::new(binary, &config.engine),
        state.clone(),
        event_tx,
    );
    let browser = Browser::open(
        library,
        config.library.start_dir.clone(),
        config.library.page_size,
    );

    // ── Terminal ─────────────────────────────────────────────────────────────
    // Release builds abort on panic, so the guard's Drop would never run.
    terminal::install_panic_hook();
    let mut guard = TerminalGuard::enter()?;
    let result = async {
        let renderer = DiffRenderer::new(CrosstermSurface::stdout())?;
        let mut app = App::new(
            controller,
            renderer,
            CrosstermInput,
            state,
            event_rx,
            browser,
            &config.player,
            config.library.page_size,
        );
        if tracks.is_empty() {
            app.show(Screen::Browser);
        } else {
            app.controller_mut().enqueue_many(tracks);
            app.controller_mut().play_at(0).await;
        }
        app.run().await
    }
    .await;

    if let Err(e) = guard.restore() {
        warn!("terminal: restore failed: {}", e);
    }

    if let Err(e) = result {
        error!("deck: {:#}", e);
        eprintln!("deck: {:#}", e);
        eprintln!("Press any key to exit.");
        if let Err(e) = terminal::wait_for_key() {
            warn!("terminal: {}", e);
        }
        std::process::exit(1);
    }

    info!("deck exiting");
    Ok(())
}

fn print_engine_help(reason: &str) {
    eprintln!();
    eprintln!("  deck plays audio through mpv, which could not be used:");
    eprintln!("    {}", reason);
    eprintln!();
    eprintln!("  Install mpv with your package manager, for example:");
    eprintln!("    Debian/Ubuntu   sudo apt install mpv");
    eprintln!("    Fedora          sudo dnf install mpv");
    eprintln!("    Arch            sudo pacman -S mpv");
    eprintln!("    macOS           brew install mpv");
    eprintln!("    Windows         scoop install mpv, or put mpv.exe next to deck.exe");
    eprintln!();
    eprintln!(
        "  Or set `binary` under [engine] in {}",
        Config::config_path().display()
    );
}
