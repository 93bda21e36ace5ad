use std::path::PathBuf;

use clap::{Parser, Subcommand};

use intake_shield::cli;
use intake_shield::cli::sanitize::SanitizeKind;
use intake_shield::config::ShieldConfig;

#[derive(Parser)]
#[command(name = "intake-shield")]
#[command(author, version, about = "Sanitize form input and scan uploads for hidden threats", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: <state dir>/config.yml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan files or directories for executable, script and embedded threats
    Scan {
        /// Files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Only scan directory entries matching these globs
        #[arg(long)]
        include: Vec<String>,

        /// Skip directory entries matching these globs
        #[arg(long)]
        exclude: Vec<String>,

        /// Client IP recorded with events for flagged files
        #[arg(long, default_value = "127.0.0.1")]
        client_ip: String,
    },

    /// Sanitize a value read from stdin
    Sanitize {
        /// Kind of value
        #[arg(value_enum)]
        kind: SanitizeKind,

        /// Maximum characters kept (text only)
        #[arg(long)]
        max_length: Option<usize>,

        /// Escape markup instead of stripping it (text only)
        #[arg(long)]
        keep_markup: bool,
    },

    /// Show recent security events
    Events {
        /// Number of events to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Show aggregate counts instead of events
        #[arg(long)]
        stats: bool,

        /// Print events as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => ShieldConfig::load_from(path)?,
        None => ShieldConfig::load_default()?,
    };

    let ok = match args.command {
        Commands::Scan {
            paths,
            json,
            include,
            exclude,
            client_ip,
        } => {
            let opts = cli::scan::ScanOptions {
                paths,
                json,
                include,
                exclude,
                client_ip,
            };
            cli::scan::run(&config, &opts).await?
        }
        Commands::Sanitize {
            kind,
            max_length,
            keep_markup,
        } => cli::sanitize::run(&config, kind, max_length, keep_markup).await?,
        Commands::Events { limit, stats, json } => {
            cli::events::run(&config, limit, stats, json)?;
            true
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
