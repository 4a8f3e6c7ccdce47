use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tidings::app::AppContext;
use tidings::cli::{commands, Cli, Commands, SourceAction};
use tidings::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(workers) = cli.workers {
        config.engine.workers = workers;
    }

    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Source { action } => match action {
            SourceAction::Add { url, name } => {
                commands::add_source(&ctx, &url, name.as_deref()).await?;
            }
            SourceAction::Remove { source } => {
                commands::remove_source(&ctx, &source)?;
            }
            SourceAction::List => {
                commands::list_sources(&ctx)?;
            }
        },
        Commands::Subscribe { subscriber, source } => {
            commands::subscribe(&ctx, subscriber, source)?;
        }
        Commands::Unsubscribe { subscriber, source } => {
            commands::unsubscribe(&ctx, subscriber, source)?;
        }
        Commands::Pause { subscriber, source } => {
            commands::set_active(&ctx, subscriber, source, false)?;
        }
        Commands::Resume { subscriber, source } => {
            commands::set_active(&ctx, subscriber, source, true)?;
        }
        Commands::Subscriptions { subscriber } => {
            commands::list_subscriptions(&ctx, subscriber)?;
        }
        Commands::Latest { url } => {
            commands::show_latest(&ctx, url.as_deref()).await?;
        }
        Commands::Run { interval, once } => {
            commands::run_engine(&ctx, interval.as_deref(), once).await?;
        }
    }

    Ok(())
}
