use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Upload images to the storage backends named in an imager config.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON config file, defaults to $IMAGER_CONFIG or ./imager.json
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend to enable, may be repeated; defaults to every configured backend
    #[arg(short, long, global = true)]
    pub backend: Vec<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload files under a variant
    Upload {
        /// Variant to apply, falls back to the configured default
        #[arg(short, long)]
        variant: Option<String>,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove previously uploaded files by name
    Remove {
        #[arg(short, long)]
        variant: Option<String>,

        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[cfg(test)]
mod test {
    use super::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn should_parse_upload() {
        let cli = Cli::try_parse_from([
            "imager", "-b", "Local", "-b", "S3", "upload", "-v", "items", "a.jpg", "b.png",
        ])
        .unwrap();
        assert_eq!(cli.backend, vec!["Local", "S3"]);
        match cli.command {
            Commands::Upload { variant, files } => {
                assert_eq!(variant.as_deref(), Some("items"));
                assert_eq!(files.len(), 2);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn should_require_names_to_remove() {
        assert!(Cli::try_parse_from(["imager", "remove", "--variant", "items"]).is_err());
        let cli = Cli::try_parse_from(["imager", "remove", "123.jpg", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Remove { variant: None, .. }));
    }
}
