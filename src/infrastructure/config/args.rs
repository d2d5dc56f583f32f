use super::app_config::{BackendKind, LogLevel};
use crate::domain::entities::ImageFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "optimedia",
    version,
    about = "Resolve and cache short-lived signed media URLs",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Signing endpoint URL.
    #[arg(long, env = "OPTIMEDIA_SIGNING_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// API key for the signing endpoint.
    #[arg(long, env = "OPTIMEDIA_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Durable store backend.
    #[arg(long, value_enum, global = true)]
    pub backend: Option<BackendKind>,

    /// Durable store location.
    #[arg(long, value_name = "PATH", global = true)]
    pub store_path: Option<PathBuf>,

    /// Share in-flight signing calls between identical requests.
    #[arg(long, global = true)]
    pub single_flight: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve one storage path to a delivery URL.
    Resolve {
        /// Storage path.
        path: String,
        /// Target width.
        #[arg(long)]
        width: Option<u32>,
        /// Target height.
        #[arg(long)]
        height: Option<u32>,
        /// Quality 1-100.
        #[arg(long)]
        quality: Option<u8>,
        /// Output format.
        #[arg(long, value_enum)]
        format: Option<ImageFormat>,
        /// URL printed when resolution fails. Without it, failure exits
        /// with an error.
        #[arg(long, value_name = "URL")]
        fallback: Option<String>,
    },
    /// Warm the caches for the leading storage paths.
    Warm {
        /// Storage paths.
        #[arg(required = true)]
        paths: Vec<String>,
        /// Target width.
        #[arg(long)]
        width: Option<u32>,
        /// Target height.
        #[arg(long)]
        height: Option<u32>,
    },
    /// Warm square avatar renditions.
    Avatars {
        /// Avatar storage paths.
        #[arg(required = true)]
        paths: Vec<String>,
        /// Edge length in pixels.
        #[arg(long, default_value_t = 100)]
        size: u32,
    },
    /// Remove expired entries from the durable store.
    Sweep,
    /// Remove every entry this tool wrote to the durable store.
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_fallback_is_optional() {
        let args = CliArgs::try_parse_from(["optimedia", "resolve", "avatars/u1.png"]).unwrap();
        assert!(matches!(args.command, Command::Resolve { fallback: None, .. }));
    }

    #[test]
    fn test_resolve_fallback_rejects_missing_value() {
        assert!(CliArgs::try_parse_from(["optimedia", "resolve", "a.png", "--fallback"]).is_err());
    }

    #[test]
    fn test_resolve_with_fallback() {
        let args = CliArgs::try_parse_from([
            "optimedia",
            "resolve",
            "a.png",
            "--fallback",
            "/img/default.png",
            "--width",
            "100",
        ])
        .unwrap();

        match args.command {
            Command::Resolve {
                fallback, width, ..
            } => {
                assert_eq!(fallback.as_deref(), Some("/img/default.png"));
                assert_eq!(width, Some(100));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args =
            CliArgs::try_parse_from(["optimedia", "sweep", "--backend", "directory"]).unwrap();
        assert!(matches!(args.command, Command::Sweep));
        assert_eq!(args.backend, Some(BackendKind::Directory));
    }
}
