use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lesswatch")]
#[command(about = "Compile LESS to CSS according to project profiles")]
pub struct Cli {
    /// Path to config file (lesswatch.json or lesswatch.jsonc)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project root
    #[arg(short = 'C', long, default_value = ".", global = true)]
    pub cwd: PathBuf,

    /// Output format
    #[arg(long, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Number of compile workers [default: number of CPUs]
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// lessc executable to run [default: lessc]
    #[arg(long, global = true)]
    pub lessc: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compile the selected files and directories once
    Compile {
        /// LESS files or directories containing them [default: every profile's LESS directory]
        paths: Vec<PathBuf>,
    },

    /// Recompile LESS files whenever they are saved
    Watch,

    /// List the configured profiles
    Profiles,

    /// Turn every notification back on and save the settings file
    ResetPrompts,
}

#[derive(Clone, Copy, ValueEnum, Default, PartialEq, Eq, Debug)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
