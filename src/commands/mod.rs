//! Command-line surface
//!
//! `organize` runs a reorganization, `auth` (re)runs the Google OAuth consent.

pub mod auth;
pub mod organize;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Overrides;

#[derive(Debug, Parser)]
#[command(name = "drive-organizer", version)]
#[command(about = "Organizes Google Drive files using AI", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/driver-organizer/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Simulate operations without moving anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Move everything into the backup folder, then reorganize it with AI suggestions
    Organize(OrganizeArgs),
    /// Authorize access to Google Drive and store the token
    Auth,
}

#[derive(Debug, Clone, Default, Args)]
pub struct OrganizeArgs {
    /// Google AI Studio API key for Gemini
    #[arg(long)]
    pub gemini_api_key: Option<String>,

    /// Gemini model to use
    #[arg(long)]
    pub gemini_model: Option<String>,

    /// Backup folder path
    #[arg(long)]
    pub backup_folder: Option<String>,

    /// Files per classification batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Maximum estimated AI cost in USD
    #[arg(long)]
    pub max_cost: Option<f64>,

    /// Continue organizing from the backup folder
    #[arg(long)]
    pub resume: bool,
}

impl Cli {
    /// Configuration values set on the command line
    pub fn overrides(&self) -> Overrides {
        let mut overrides = Overrides {
            log_level: self.log_level.clone(),
            dry_run: self.dry_run,
            ..Overrides::default()
        };
        if let Commands::Organize(args) = &self.command {
            overrides.gemini_api_key = args.gemini_api_key.clone();
            overrides.gemini_model = args.gemini_model.clone();
            overrides.backup_folder = args.backup_folder.clone();
            overrides.batch_size = args.batch_size;
            overrides.max_cost = args.max_cost;
        }
        overrides
    }
}
