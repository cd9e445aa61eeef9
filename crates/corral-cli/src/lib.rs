//! corral CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// corral - Cluster API object generation with rename-on-change
#[derive(Parser, Debug)]
#[command(name = "corral")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Log output format
    #[arg(long, global = true, env = "CORRAL_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Kubeconfig of the management cluster (inferred when unset)
    #[arg(long, global = true, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Namespace for objects that do not name one
    #[arg(long, global = true, env = "CORRAL_NAMESPACE")]
    pub namespace: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact human readable lines
    Text,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    pub fn is_json(self) -> bool {
        self == LogFormat::Json
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assemble an existing object stream and rename changed templates
    Generate(commands::generate::GenerateArgs),
    /// Render a docker cluster from its description and rename changed templates
    Docker(commands::docker::DockerArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Generate(args) => commands::generate::run(args, &self.global).await,
            Commands::Docker(args) => commands::docker::run(args, &self.global).await,
        }
    }
}
