use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod render;
mod server;

#[derive(Parser)]
#[command(name = "pomocycle", version, about = "Pomocycle multi-level interval timer")]
pub struct Cli {
    /// Config file (TOML, or JSON for a .json path). Defaults to
    /// ~/.config/pomocycle/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the cycle engine with status server and terminal progress bars
    Run(commands::run::RunArgs),
    /// Print planned micro-intervals for upcoming meso-groups
    Plan(commands::plan::PlanArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Generate shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(%info, "panic");
        default_hook(info);
    }));

    let config_path = cli.config;
    let result = match cli.command {
        Commands::Run(args) => commands::run::run(config_path.as_deref(), args),
        Commands::Plan(args) => commands::plan::run(config_path.as_deref(), args),
        Commands::Config { action } => commands::config::run(config_path.as_deref(), action),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
