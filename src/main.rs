mod app;
mod config;
mod message;
mod model;
mod project;
mod store;
mod worktree;

use anyhow::{Context, Result};
use app::App;
use config::Config;
use message::{Message, USAGE};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || matches!(args[0].as_str(), "help" | "-h" | "--help") {
        println!("{USAGE}");
        return Ok(());
    }
    let msg = Message::from_args(&args)?;

    let config = Config::load()?;
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory {}", config.data_dir.display()))?;
    init_tracing(&config);

    let app = App::init(config).await?;
    let result = app.update(msg).await;
    app.shutdown().await?;

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}

/// Log to a file in the data directory, or stderr if it cannot be opened
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let writer = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_file())
    {
        Ok(file) => BoxMakeWriter::new(Mutex::new(file)),
        Err(_) => BoxMakeWriter::new(std::io::stderr),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .try_init();
}
