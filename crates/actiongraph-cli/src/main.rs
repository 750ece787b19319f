mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "actiongraph",
    about = "Compile intent documents into validated, executable action graphs",
    version,
    propagate_version = true
)]
struct Cli {
    /// Compiler config (default: nearest actiongraph.yaml, else built-in defaults)
    #[arg(long, global = true, env = "ACTIONGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log every repair and rule decision
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and emit the compiled document
    Compile {
        /// Intent document (.json, .yaml or .yml)
        file: PathBuf,
        /// Write the compiled document here instead of stdout
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Skip auto-repair; orphaned actions become rejections
        #[arg(long)]
        no_repair: bool,
    },

    /// Normalize and validate without repairing or building a graph
    Validate {
        file: PathBuf,
        /// Include cross-entity contract rules
        #[arg(long)]
        full: bool,
    },

    /// Report reachable and orphaned actions after normalization
    Reach { file: PathBuf },

    /// Dry-run the document's trigger wiring
    Simulate {
        file: PathBuf,
        /// Override simulation.step_budget
        #[arg(long)]
        budget: Option<usize>,
    },

    /// Print the canonical form of one or more identifiers
    Canon {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Inspect and scaffold the compiler config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Compile {
            file,
            out,
            no_repair,
        } => cmd::compile::run(config, &file, out.as_deref(), no_repair, cli.json),
        Commands::Validate { file, full } => cmd::validate::run(config, &file, full, cli.json),
        Commands::Reach { file } => cmd::reach::run(config, &file, cli.json),
        Commands::Simulate { file, budget } => cmd::simulate::run(config, &file, budget, cli.json),
        Commands::Canon { ids } => cmd::canon::run(&ids, cli.json),
        Commands::Config { subcommand } => cmd::config::run(config, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
