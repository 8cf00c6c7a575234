use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsString;

mod args;
mod cmd;
mod env;
mod ui;

use crate::args::CLIArgs;

#[derive(Debug, Parser)]
#[command(name = "cairn", about = "Cairn record management CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// View available projects
    Projects(CLIArgs<cmd::meta::EmptyArgs>),
    /// View available field types
    Types(CLIArgs<cmd::meta::EmptyArgs>),
    /// View available lookups
    Lookups(CLIArgs<cmd::meta::EmptyArgs>),
    /// View fields for a project
    Fields(CLIArgs<cmd::meta::FieldsArgs>),
    /// View choices for a field
    Choices(CLIArgs<cmd::meta::ChoicesArgs>),
    /// Get a record from a project
    Get(CLIArgs<cmd::records::GetArgs>),
    /// Filter records from a project
    Filter(CLIArgs<cmd::records::FilterArgs>),
    /// Create record(s) in a project
    Create(CLIArgs<cmd::records::CreateArgs>),
    /// Update record(s) in a project
    Update(CLIArgs<cmd::records::UpdateArgs>),
    /// Delete record(s) in a project
    Delete(CLIArgs<cmd::records::DeleteArgs>),
    /// View the history of a record
    History(CLIArgs<cmd::records::HistoryArgs>),
    /// Get the anonymised identifier for a value on a field
    Identify(CLIArgs<cmd::records::IdentifyArgs>),
    /// Authentication commands
    Auth(CLIArgs<cmd::account::AuthArgs>),
    /// Admin commands
    Admin(CLIArgs<cmd::account::AdminArgs>),
}

#[tokio::main]
async fn main() -> Result<()> {
    let argv: Vec<OsString> = std::env::args_os().collect();
    env::bootstrap_from_args(&argv)?;
    let cli = Cli::parse_from(argv);

    match cli.command {
        Commands::Projects(cmd) => cmd::meta::run_projects(cmd.base).await?,
        Commands::Types(cmd) => cmd::meta::run_types(cmd.base).await?,
        Commands::Lookups(cmd) => cmd::meta::run_lookups(cmd.base).await?,
        Commands::Fields(cmd) => cmd::meta::run_fields(cmd.base, cmd.args).await?,
        Commands::Choices(cmd) => cmd::meta::run_choices(cmd.base, cmd.args).await?,
        Commands::Get(cmd) => cmd::records::run_get(cmd.base, cmd.args).await?,
        Commands::Filter(cmd) => cmd::records::run_filter(cmd.base, cmd.args).await?,
        Commands::Create(cmd) => cmd::records::run_create(cmd.base, cmd.args).await?,
        Commands::Update(cmd) => cmd::records::run_update(cmd.base, cmd.args).await?,
        Commands::Delete(cmd) => cmd::records::run_delete(cmd.base, cmd.args).await?,
        Commands::History(cmd) => cmd::records::run_history(cmd.base, cmd.args).await?,
        Commands::Identify(cmd) => cmd::records::run_identify(cmd.base, cmd.args).await?,
        Commands::Auth(cmd) => cmd::account::run_auth(cmd.base, cmd.args).await?,
        Commands::Admin(cmd) => cmd::account::run_admin(cmd.base, cmd.args).await?,
    }

    Ok(())
}
