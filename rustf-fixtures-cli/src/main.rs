use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "rustf-fixtures")]
#[command(about = "Versioned migrations for YAML test fixtures")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory (defaults to current directory)
    #[arg(short = 'P', long, global = true)]
    project: Option<PathBuf>,

    /// Test suite folder relative to the project (defaults to tests)
    #[arg(long, global = true)]
    suite: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up fixture migrations in a project
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Create a new SQL fixture migration
    New {
        /// Migration name, e.g. add_green_turtle
        name: String,
    },

    /// Show recorded versions and pending migrations
    Status,

    /// Run pending fixture migrations and regenerate fixtures
    Migrate,

    /// Roll back the last executed fixture migration
    Rollback,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let project_path = match cli.project {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let suite = cli.suite;

    match cli.command {
        Commands::Init { force } => commands::init::run(project_path, suite, force).await,
        Commands::New { name } => commands::new::run(project_path, suite, name).await,
        Commands::Status => commands::status::run(project_path, suite).await,
        Commands::Migrate => commands::migrate::run(project_path, suite).await,
        Commands::Rollback => commands::migrate::rollback(project_path, suite).await,
    }
}
