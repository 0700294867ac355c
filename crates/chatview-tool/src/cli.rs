use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Inspect chat view theme bundles.
#[derive(Parser, Debug)]
#[command(name = "chatview-tool", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Extra theme search path, tried before the configured ones.
    #[arg(long = "search-path", value_name = "DIR")]
    pub search_paths: Vec<PathBuf>,

    /// Treat themes as group chat themes.
    #[arg(long)]
    pub group: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the bundles of a theme type.
    List {
        /// Theme type, e.g. `adium`.
        theme_type: String,
    },
    /// Show where a theme's files and scripts resolve to.
    Inspect {
        /// Theme id, `<type>/<name>`.
        id: String,
    },
    /// Print a file of a theme bundle as the content handler would serve it.
    Cat {
        id: String,
        path: String,
        /// Match path components ignoring case.
        #[arg(short = 'i', long)]
        case_insensitive: bool,
    },
    /// Print the effective configuration as JSON.
    Config,
}

pub fn parse() -> Args {
    Args::parse()
}
