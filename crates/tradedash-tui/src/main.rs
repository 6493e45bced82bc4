//! Tradedash TUI - a terminal front end for the tradedash trading dashboard.
//!
//! Keyboard-driven: sign in, move between the dashboard pages, and watch
//! backend and exchange status without leaving the terminal.

mod app;
mod ui;

use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tradedash_core::config::Config;

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE: &str = "tradedash.log";

/// Initialize the tracing subscriber for logging.
///
/// The terminal belongs to the UI, so logs go to a file in the cache
/// directory. Use RUST_LOG to control the level (e.g. RUST_LOG=debug).
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_dir = config.cache_dir().ok()?;
    std::fs::create_dir_all(&log_dir).ok()?;
    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    Some(guard)
}

fn print_usage() {
    println!("Usage: tradedash [--login | --logout] [--ephemeral] [PATH]");
    println!();
    println!("  PATH         Page to open at startup, e.g. /trading");
    println!("  --login      Sign in from the command line and store the session");
    println!("  --logout     Sign out and remove the stored session");
    println!("  --ephemeral  Keep tokens in memory only for this run");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config, using defaults: {}", e);
            Config::default()
        }
    };
    let _log_guard = init_tracing(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let ephemeral = args.iter().any(|a| a == "--ephemeral");
    let store = app::open_token_store(&config, ephemeral)?;

    let mut start_path = None;
    for arg in args.iter().filter(|a| *a != "--ephemeral") {
        match arg.as_str() {
            "--login" => return app::login_interactive(config, store).await,
            "--logout" => return app::logout_command(&config, store).await,
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            path if path.starts_with('/') => start_path = Some(path.to_string()),
            other => {
                eprintln!("Unknown argument: {}\n", other);
                print_usage();
                return Ok(());
            }
        }
    }

    info!(api = %config.api_base_url, "Tradedash TUI starting");

    // Create app before touching the terminal so setup errors print normally
    let mut app = App::new(config, store)?;
    if let Some(path) = start_path {
        app.open_start_path(&path);
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        warn!(error = %e, "Terminal loop failed");
        eprintln!("Error: {}", e);
    }

    info!("Tradedash TUI shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Fold in background results and settle the route before drawing
        app.update();

        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key)? {
                    return Ok(());
                }
            }
        }

        // Let spawned tasks make progress between frames
        tokio::task::yield_now().await;

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
