use clap::Parser;
use eyre::Result;
use imager::{Config, Imager};
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, Commands};

mod args;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("imager=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    let selector: Vec<String> = if cli.backend.is_empty() {
        config.storage.keys().cloned().collect()
    } else {
        cli.backend.clone()
    };
    let imager = Imager::new(config, selector)?;

    match cli.command {
        Commands::Upload { variant, files } => {
            let report = imager.upload(files, variant.as_deref()).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report.uploaded)?);
            } else {
                for uploaded in &report.uploaded {
                    println!(
                        "{} [{}] {} -> {}",
                        uploaded.original_name, uploaded.backend, uploaded.name, uploaded.uri
                    );
                }
            }

            if let Some(e) = report.error {
                return Err(e.into());
            }
            if let Some(uri) = report.primary_uri {
                tracing::info!(%uri, "Upload complete");
            }
        }
        Commands::Remove { variant, names } => {
            let report = imager.remove(names, variant.as_deref()).await?;

            for removed in &report.removed {
                match &removed.error {
                    None => println!("{} [{}] removed", removed.name, removed.backend),
                    Some(e) => println!("{} [{}] failed: {}", removed.name, removed.backend, e),
                }
            }

            if let Some(e) = report.error {
                return Err(e.into());
            }
        }
    }

    Ok(())
}
