use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use threadkeep_core::error::ThreadkeepError;
use threadkeep_core::history::MessageRole;
use threadkeep_infrastructure::ConfigService;

mod app;
mod commands;
mod logging;
mod runtime;

use app::App;
use commands::output::Output;

#[derive(Parser)]
#[command(name = "threadkeep")]
#[command(about = "Threadkeep - persistent conversation thread directory", long_about = None)]
#[command(version)]
struct Cli {
    /// Data directory holding the store (overrides the config file)
    #[arg(long, global = true, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List regular threads, marking the main thread
    List,
    /// List archived threads
    Archived,
    /// Show one thread
    Show { id: String },
    /// Create a new thread and make it the main thread
    New,
    /// Register a thread with a caller-chosen id
    Init { id: String },
    /// Make a thread the main thread, unarchiving it if needed
    Switch { id: String },
    /// Set a thread's title
    Rename { id: String, title: String },
    /// Archive a thread
    Archive { id: String },
    /// Restore an archived thread
    Unarchive { id: String },
    /// Delete a thread and its history
    Delete { id: String },
    /// Derive a title from the thread's first user message
    Title { id: String },
    /// Append a message to the main thread
    Say {
        #[arg(required = true)]
        text: Vec<String>,
        /// Message role: user, assistant or system
        #[arg(long, default_value = "user")]
        role: MessageRole,
    },
    /// Print the current branch of a thread's history
    History { id: Option<String> },
    /// Validate and repair the directory
    Check,
    /// Show the effective configuration
    Config {
        /// Write the default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let exhausted = err
                .downcast_ref::<ThreadkeepError>()
                .is_some_and(ThreadkeepError::is_storage_exhausted);
            if exhausted {
                eprintln!("{} {:#}", "Storage is full:".red().bold(), err);
            } else {
                eprintln!("{} {:#}", "Error:".red(), err);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_service = ConfigService::default_location().context("Failed to locate config file")?;
    let config = config_service
        .load()
        .with_context(|| format!("Failed to load {}", config_service.path().display()))?;
    logging::init(&config.log_filter, cli.verbose);

    let out = Output::new(cli.json);
    if let Commands::Config { init } = cli.command {
        return commands::config::run(&config_service, &config, init, &out);
    }

    let app = App::open(cli.data_dir, &config).await?;
    match cli.command {
        Commands::List => commands::threads::list(&app, &out).await,
        Commands::Archived => commands::threads::archived(&app, &out).await,
        Commands::Show { id } => commands::threads::show(&app, &id, &out).await,
        Commands::New => commands::threads::new(&app, &out).await,
        Commands::Init { id } => commands::threads::init(&app, &id, &out).await,
        Commands::Switch { id } => commands::threads::switch(&app, &id, &out).await,
        Commands::Rename { id, title } => commands::threads::rename(&app, &id, &title, &out).await,
        Commands::Archive { id } => commands::threads::archive(&app, &id, &out).await,
        Commands::Unarchive { id } => commands::threads::unarchive(&app, &id, &out).await,
        Commands::Delete { id } => commands::threads::delete(&app, &id, &out).await,
        Commands::Title { id } => commands::threads::title(&app, &id, &out).await,
        Commands::Say { text, role } => {
            commands::history::say(&app, role, &text.join(" "), &out).await
        }
        Commands::History { id } => commands::history::history(&app, id.as_deref(), &out).await,
        Commands::Check => commands::check::run(&app, &out).await,
        Commands::Config { .. } => Ok(()),
    }
}
