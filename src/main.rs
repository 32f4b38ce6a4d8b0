//! Buildscope CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "buildscope")]
#[command(about = "C++ build profiler: dependency graphs and build-cost metrics from MSVC logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a build log, run the analysis and write reports
    Profile {
        /// Directory the reports are written to
        #[arg(short, long, default_value = ".")]
        profile_dir: PathBuf,

        /// Build log to parse; relative paths resolve against the profile directory
        #[arg(short, long, default_value = "log.txt")]
        log_file: PathBuf,

        /// Prune dependencies of files outside this directory (third-party code)
        #[arg(short, long)]
        codebase_dir: Option<String>,

        /// Report column separator; \t and \n are recognized
        #[arg(long, default_value = ",")]
        column_separator: String,
    },
    /// Slice a stored dependency graph around one node
    Subgraph {
        /// Stored graph to read
        input: PathBuf,

        /// Node label to slice around
        label: String,

        /// Where to store the resulting graph
        output: PathBuf,

        /// Include the node's dependencies
        #[arg(long)]
        dependencies: bool,

        /// Include the node's dependants
        #[arg(long)]
        dependants: bool,
    },
    /// Show version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "buildscope={0},buildscope_core={0},buildscope_parser={0}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Profile {
            profile_dir,
            log_file,
            codebase_dir,
            column_separator,
        } => commands::profile(profile_dir, log_file, codebase_dir, column_separator),
        Commands::Subgraph {
            input,
            label,
            output,
            dependencies,
            dependants,
        } => commands::subgraph(input, label, output, dependencies, dependants),
        Commands::Version => {
            println!("buildscope v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
