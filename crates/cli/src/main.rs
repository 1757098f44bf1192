mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use output::OutputFormat;

/// hostform - Apply declarative command and file resources to this host
#[derive(Parser)]
#[command(name = "hostform")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Apply every resource in a JSON file, in order
  Apply {
    /// Path to a JSON array of resource records
    file: PathBuf,

    /// Continue with the remaining resources after a failure
    #[arg(short, long)]
    keep_going: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },

  /// Validate resources without touching the host
  Check {
    /// Path to a JSON array of resource records
    file: PathBuf,
  },

  /// Print each resource's description
  Describe {
    /// Path to a JSON array of resource records
    file: PathBuf,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Apply {
      file,
      keep_going,
      output,
    } => cmd::cmd_apply(&file, keep_going, output),
    Commands::Check { file } => cmd::cmd_check(&file),
    Commands::Describe { file } => cmd::cmd_describe(&file),
  }
}
