use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use ortwin::config::SimulatorConfig;
use ortwin::Result;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ortwin")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operating-room digital twin: sensor-driven procedure simulation with shape validation", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (default: ./ortwin.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive simulation
    Run {
        /// Procedure to start with (default: initial_procedure from config)
        #[arg(short, long)]
        procedure: Option<String>,

        /// Print the full validation report text on failures
        #[arg(long)]
        show_report: bool,
    },

    /// Serve the HTTP API
    Serve {
        /// Bind address (default: from config)
        #[arg(long)]
        host: Option<String>,

        /// Port (default: from config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List known procedures
    Procedures {
        /// Show step sequences and phase tables
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate the knowledge base once
    Validate {
        /// Procedure whose bootstrap triples are included
        #[arg(short, long)]
        procedure: Option<String>,

        /// Output the report as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ORTWIN_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}", format!("Error: failed to create tokio runtime: {}", e).red());
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_async(cli)) {
        eprintln!("{}", format!("Error: {:#}", e).red());
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<SimulatorConfig> {
    let cwd = std::env::current_dir()?;
    SimulatorConfig::load(path, &cwd)
}

async fn run_async(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run {
            procedure,
            show_report,
        } => {
            let mut config = load_config(config_path)?;
            config.show_validation_report |= show_report;
            // Blocking prompts stay off the async workers
            tokio::task::spawn_blocking(move || {
                ortwin::cli::run::run(&config, procedure.as_deref())
            })
            .await??;
        }

        Commands::Serve { host, port } => {
            let config = load_config(config_path)?;
            ortwin::cli::serve::run(config, host, port).await?;
        }

        Commands::Procedures { verbose } => {
            ortwin::cli::procedures::run(&load_config(config_path)?, verbose)?;
        }

        Commands::Validate { procedure, json } => {
            ortwin::cli::validate::run(&load_config(config_path)?, procedure.as_deref(), json)?;
        }

        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "ortwin", &mut io::stdout());
        }
    }

    Ok(())
}
