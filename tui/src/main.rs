//! FuriaBot TUI - entry point
//!
//! # Usage
//!
//! ```bash
//! # Full-screen client against the default service
//! furiabot-tui
//!
//! # Another service
//! furiabot-tui --api-url https://bot.example.com
//!
//! # One message, reply on stdout
//! furiabot-tui --once "Quando é o próximo jogo?"
//!
//! # Verbose logging (written to $XDG_STATE_HOME/furiabot/tui.log)
//! RUST_LOG=debug furiabot-tui
//! ```

use std::io::{self, IsTerminal};
use std::panic;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;

use furiabot_core::config::load_config_from_path;
use furiabot_core::{CredentialStore, HttpBackend, TokenStore};
use furiabot_tui::cli::Args;
use furiabot_tui::logging::{default_log_path, init_logging};
use furiabot_tui::once::run_once;
use furiabot_tui::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_path = args.log_file.clone().unwrap_or_else(default_log_path);
    init_logging(args.log_level.as_deref(), &log_path)?;

    let mut config =
        load_config_from_path(args.config.clone()).context("Failed to load configuration")?;
    args.overrides()
        .apply(&mut config)
        .context("Invalid command-line option")?;
    info!(api_url = %config.api_url, source = %config.source(), "Configuration loaded");

    let tokens = TokenStore::open(CredentialStore::new(config.credentials_path.clone()))
        .context("Failed to read saved credentials")?;
    let api = Arc::new(
        HttpBackend::from_config(&config, tokens).context("Failed to create HTTP client")?,
    );

    if let Some(message) = args.once.as_deref() {
        if !api.tokens().is_authenticated() {
            bail!("Not logged in. Run furiabot-tui without --once and log in first.");
        }
        return run_once(
            api,
            config.refetch_delay,
            args.session.as_deref(),
            message,
            &mut io::stdout(),
        )
        .await;
    }

    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        eprintln!("Error: furiabot-tui requires a terminal (TTY)");
        eprintln!();
        eprintln!("For scripts and pipes use: furiabot-tui --once \"<message>\"");
        std::process::exit(1);
    }

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut app = App::new(config, api);
    let result = app.run(&mut terminal).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}
