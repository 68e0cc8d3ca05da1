use analyst_execution::logging::{self, LogFormat};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "analyst")]
#[command(about = "Traffic Analyst - LLM-backed security review of HTTP exchanges", long_about = None)]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage analyst roles (personas)
    Roles {
        #[command(subcommand)]
        action: RolesAction,
    },
    /// Show or change backend settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List models installed on the local backend
    Models,
    /// Replay a request and ask the model to review it
    Analyze(commands::analyze::AnalyzeArgs),
}

#[derive(Subcommand)]
enum RolesAction {
    /// List roles, marking the active one
    List,
    /// Print a role's prompt
    Show { name: Option<String> },
    /// Add or replace a role
    Add {
        name: String,
        /// Prompt text
        prompt: String,
    },
    /// Delete a role (the default role cannot be deleted)
    Remove { name: String },
    /// Make a role active
    Activate { name: String },
    /// Restore the built-in roles
    Reset,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print backend settings and the config file location
    Show,
    /// Set the backend URL (must be local)
    SetUrl { url: String },
    /// Set the model name
    SetModel { model: String },
    /// Restore default backend settings
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };

    if let Commands::Analyze(args) = &cli.command {
        if args.events {
            let events = logging::init_tracing_with_events(&cli.log_level, format);
            return commands::analyze::run(cli.config.as_deref(), args, events).await;
        }
    }
    logging::init_tracing(&cli.log_level, format);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Roles { action } => match action {
            RolesAction::List => commands::roles::list(config)?,
            RolesAction::Show { name } => commands::roles::show(config, name.as_deref())?,
            RolesAction::Add { name, prompt } => commands::roles::add(config, &name, &prompt)?,
            RolesAction::Remove { name } => commands::roles::remove(config, &name)?,
            RolesAction::Activate { name } => commands::roles::activate(config, &name)?,
            RolesAction::Reset => commands::roles::reset(config)?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(config)?,
            ConfigAction::SetUrl { url } => commands::config::set_url(config, &url)?,
            ConfigAction::SetModel { model } => commands::config::set_model(config, &model)?,
            ConfigAction::Reset => commands::config::reset(config)?,
        },
        Commands::Models => commands::models::list(config).await?,
        Commands::Analyze(args) => commands::analyze::run(config, &args, None).await?,
    }

    Ok(())
}
