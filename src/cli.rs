use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arrsync")]
#[command(version)]
#[command(about = "Declarative configuration sync for *arr media servers", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge every declared server to its desired configuration
    Sync(SyncArgs),

    /// Check connectivity to every declared server
    Doctor(DoctorArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct SyncArgs {
    /// Declaration file to apply
    #[arg(short, long, env = "ARRSYNC_CONFIG")]
    pub config: PathBuf,

    /// Only sync the named server
    #[arg(short, long)]
    pub server: Option<String>,
}

#[derive(Parser)]
pub struct DoctorArgs {
    /// Declaration file listing the servers to check
    #[arg(short, long, env = "ARRSYNC_CONFIG")]
    pub config: PathBuf,
}
