//! `Taskboard`: live terminal task board.
//!
//! Launches the TUI against a remote store, or against an in-process store
//! in offline demo mode. Configuration via CLI flags, environment variables,
//! or config file (`~/.config/taskboard/config.toml`).
//!
//! ```bash
//! # Offline demo mode
//! cargo run --bin taskboard
//!
//! # Connect to a store
//! cargo run --bin taskboard -- --store-url ws://127.0.0.1:9300/ws
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use taskboard_proto::task::{NewTask, Priority};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use taskboard::app::{self, App, Outcome};
use taskboard::config::{CliArgs, ClientConfig};
use taskboard::remote::RemoteStore;
use taskboard::remote::memory::MemoryStore;
use taskboard::remote::ws::WsStore;
use taskboard::sync::SyncEngine;
use taskboard::ui;

/// Where the board's tasks come from.
struct Source<S> {
    store: Arc<S>,
    label: String,
    seed_demo: bool,
    notice: Option<String>,
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Logs go to a file; ratatui owns the terminal.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!("taskboard starting");

    let remote = match config.store_url.as_deref() {
        Some(url) => match WsStore::connect(url, config.store_options()).await {
            Ok(store) => Ok(Source {
                store: Arc::new(store),
                label: url.to_string(),
                seed_demo: false,
                notice: Some(format!("Connected to {url}")),
            }),
            Err(e) => {
                tracing::warn!(url, error = %e, "store unreachable, running offline");
                Err(Some(format!("Could not reach store, running offline ({e})")))
            }
        },
        None => Err(None),
    };

    // Set up terminal.
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = match remote {
        Ok(source) => run_app(&mut terminal, source, &config).await,
        Err(notice) => {
            let source = Source {
                store: Arc::new(MemoryStore::with_channel_capacity(config.channel_capacity)),
                label: "offline demo".to_string(),
                seed_demo: true,
                notice,
            };
            run_app(&mut terminal, source, &config).await
        }
    };

    // Restore terminal.
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    tracing::info!("taskboard exiting");
    result
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskboard.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Main application loop.
async fn run_app<S: RemoteStore>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    source: Source<S>,
    config: &ClientConfig,
) -> io::Result<()> {
    let mut app = App::new(source.label, config.date_format.clone());
    if let Some(notice) = source.notice {
        app.set_info(notice);
    }

    let engine = Arc::new(SyncEngine::new(source.store, config.sync_options()));
    let mut view_rx = engine.subscribe_view();
    if let Err(e) = engine.start().await {
        app.set_error(format!("Could not subscribe to tasks: {e}"));
    }
    if source.seed_demo {
        seed_demo_tasks(&engine).await;
    }

    // Mutation outcomes come back from spawned tasks.
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<Outcome>();

    loop {
        // Step 1: Draw the UI frame.
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Step 2: Pick up the latest view (non-blocking).
        if view_rx.has_changed().unwrap_or(false) {
            let view = view_rx.borrow_and_update().clone();
            app.apply_view(&view);
        }

        // Step 3: Drain finished mutations.
        while let Ok(outcome) = outcome_rx.try_recv() {
            app.report(outcome);
        }

        // Step 4: Poll for terminal input events.
        if event::poll(config.poll_timeout)?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            // Writes run off the UI loop; their effect arrives with a snapshot.
            if let Some(intent) = app.handle_key_event(key) {
                let engine = Arc::clone(&engine);
                let tx = outcome_tx.clone();
                tokio::spawn(async move {
                    let outcome = app::execute(&engine, intent).await;
                    let _ = tx.send(outcome);
                });
            }
        }

        if app.should_quit {
            engine.stop();
            return Ok(());
        }
    }
}

/// Fills the offline board with a few tasks.
async fn seed_demo_tasks<S: RemoteStore>(engine: &SyncEngine<S>) {
    let demo = [
        ("Sketch the board layout", "sam", Priority::Normal),
        ("Wire up the store", "", Priority::High),
        ("Write release notes", "kim", Priority::Low),
    ];
    for (name, who, priority) in demo {
        let task = NewTask {
            assigned_to: who.to_string(),
            priority,
            ..NewTask::named(name)
        };
        if let Err(e) = engine.create(task).await {
            tracing::warn!(error = %e, "failed to seed demo task");
        }
    }
}
