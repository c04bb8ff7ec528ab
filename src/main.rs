//! Keiba-Stats CLI
//!
//! Historical race features and grouped ROI tables over a local SQLite store.

mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use keiba_stats::config::AppConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keiba_stats=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let mut config = AppConfig::load_from(cli.config.as_deref())?;

    // Override with CLI args
    if let Some(db) = cli.db {
        config.database.path = db.to_string_lossy().to_string();
    }

    tracing::debug!("Configuration loaded: {:?}", config);

    match cli.command {
        Commands::InitDb => cli::run_init_db(&config),
        Commands::Features {
            race_id,
            window,
            output,
            format,
        } => cli::run_features(&config, &race_id, window, output, &format),
        Commands::History {
            horse_id,
            races,
            window,
            format,
        } => cli::run_history(&config, &horse_id, races, window, &format),
        Commands::Top {
            kind,
            top_n,
            dims,
            builder,
            format,
        } => cli::run_top(&config, kind, top_n, &dims, &builder, &format),
        Commands::Score {
            kind,
            dims,
            builder,
        } => cli::run_score(&config, kind, &dims, &builder),
        Commands::Last3f {
            group,
            adjust,
            builder,
            format,
        } => cli::run_last_3f(&config, group, adjust, &builder, &format),
    }
}
