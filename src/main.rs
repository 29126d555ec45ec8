//! glimpse: index a media library into a browsable tree.
//!
//! `scan` walks the library, refreshes the cache artifacts, and extracts
//! missing video posters; `tree` and `tags` read back what the index knows.

mod app;
mod error;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use exn::{OptionExt, ResultExt};
use glimpse_config::Config;
use glimpse_index::{ItemKind, tag_stats};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::app::App;
use crate::error::{ErrorKind, Result};

#[derive(Parser, Debug)]
#[command(name = "glimpse", about = "Media tree indexer with cached posters", version)]
struct Cli {
    /// Configuration file (YAML, TOML or JSON). Defaults to `glimpse.yaml`
    /// found in the working directory or any parent.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan the library, refresh the cache, and generate missing posters
    Scan {
        /// Keep running, rescanning whenever the freshness window expires
        #[arg(long)]
        watch: bool,
    },
    /// Print the indexed tree as JSON
    Tree {
        /// Subdirectory to print, relative to the library root
        path: Option<String>,
    },
    /// Aggregate tag statistics across all indexed images
    Tags {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "glimpse=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    run(cli).await.map_err(|error| miette::miette!("{error:?}"))
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    match cli.command {
        Commands::Scan { watch } => {
            let app = App::assemble(&config, true)?;
            if watch {
                app.run_watch(config.scan.window()).await?;
            } else {
                app.run_scan().await;
                print_summary(&app);
            }
        }
        Commands::Tree { path } => {
            let app = App::assemble(&config, false)?;
            app.ensure_tree().await;
            let node = match &path {
                Some(path) => app
                    .root
                    .find(path)
                    .ok_or_raise(|| ErrorKind::UnknownPath(path.clone()))?,
                None => Arc::clone(&app.root),
            };
            println!("{:#}", node.display_tree());
        }
        Commands::Tags { json } => {
            let app = App::assemble(&config, false)?;
            app.ensure_tree().await;
            let images = app.root.images();
            let policy = app.cache.tag_policy();
            let stats = tag_stats(&images, |tag| policy.is_visible(tag));
            if json {
                let rendered =
                    serde_json::to_string_pretty(&stats).or_raise(|| ErrorKind::Render)?;
                println!("{rendered}");
            } else {
                for stat in &stats {
                    println!(
                        "{:<32} {:>6}  avg {:>5.1}  weight {:>8.1}",
                        stat.tag, stat.count, stat.avg_score, stat.weight
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_summary(app: &App) {
    let mut directories = 0usize;
    let mut images = 0usize;
    let mut videos = 0usize;
    let mut others = 0usize;
    for item in app.root.flatten() {
        match item.kind {
            ItemKind::Directory => directories += 1,
            ItemKind::Image => images += 1,
            ItemKind::Video => videos += 1,
            ItemKind::File => others += 1,
        }
    }
    println!("Indexed {directories} directories, {images} images, {videos} videos, {others} other files");
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_declaration_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scan_watch_flag_parses() {
        let cli = Cli::try_parse_from(["glimpse", "scan", "--watch"]).expect("parse");
        assert!(matches!(cli.command, Commands::Scan { watch: true }));
    }

    #[test]
    fn test_tree_takes_optional_path_and_global_config() {
        let cli = Cli::try_parse_from(["glimpse", "tree", "a/b", "--config", "custom.toml"])
            .expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Commands::Tree { path } => assert_eq!(path.as_deref(), Some("a/b")),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
