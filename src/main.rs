use clap::Parser;

mod app;
mod cli;

use app::App;
use cli::{Cli, Command};
use linkmirror::config::Config;
use linkmirror::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Only show warnings and errors unless asked for more
    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let app = App::new(config).await?;

    match cli.cmd {
        Command::Sync { full } => app.sync_once(full).await?,
        Command::Watch => app.watch().await?,
        Command::Status => app.print_status().await?,
        Command::Pause => app.set_paused(true).await?,
        Command::Resume => app.set_paused(false).await?,
        Command::Read { id } => app.mark_read(id).await?,
        Command::Progress { id, fraction, mode } => {
            app.set_progress(id, fraction, mode.map(Into::into)).await?
        }
        Command::List { archived } => app.list(archived).await?,
    }

    Ok(())
}
