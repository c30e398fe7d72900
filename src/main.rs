mod analysis;
mod app;
mod catalog;
mod config;
mod error;
mod player;
mod ui;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::app::App;
use crate::config::Config;
use crate::error::Result;

fn setup_logging() -> Result<()> {
    let data_dir = config::data_dir()?;
    std::fs::create_dir_all(&data_dir)?;

    let file_appender = tracing_appender::rolling::daily(&data_dir, "zenith.log");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("zenith=info".parse().unwrap()))
        .with(fmt::layer().with_writer(file_appender).with_ansi(false))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up file-based logging (we own the terminal for TUI)
    if let Err(e) = setup_logging() {
        eprintln!("Warning: Could not set up logging: {}", e);
    }

    info!("Starting zenith");

    // Load configuration
    let config = Config::load()?;
    info!("Loaded config");

    // Initialize terminal
    let mut terminal = app::init_terminal()?;

    // Run the app (async)
    let mut app = App::new(config);
    let result = app.run(&mut terminal).await;

    // Restore terminal on exit
    app::restore_terminal()?;

    result
}
