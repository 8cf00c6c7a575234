use anyhow::Result;
use clap::{Args, Subcommand};
use dialoguer::{Input, Password};

use cairn::{Client, Config, Registration};

use crate::args::BaseArgs;
use crate::ui::{print_command_status, print_data, CommandStatus};

#[derive(Debug, Clone, Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthSubcommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum AuthSubcommand {
    /// Create a new user
    Register(RegisterArgs),
    /// Log in and print the session token
    Login,
    /// Invalidate the current session token
    Logout,
    /// Invalidate every session token for the user
    Logoutall,
    /// View the user's information
    Profile,
    /// View the user's latest request activity
    Activity,
}

#[derive(Debug, Clone, Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub site: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct AdminArgs {
    #[command(subcommand)]
    pub command: AdminSubcommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum AdminSubcommand {
    /// Users waiting for approval
    Waiting,
    /// Approve a user
    Approve(ApproveArgs),
    /// Users within the requesting user's site
    SiteUsers,
    /// All users
    AllUsers,
}

#[derive(Debug, Clone, Args)]
pub struct ApproveArgs {
    /// Username of the user to approve
    pub username: String,
}

pub async fn run_auth(base: BaseArgs, args: AuthArgs) -> Result<()> {
    match args.command {
        AuthSubcommand::Register(args) => run_register(base, args).await,
        AuthSubcommand::Login => run_login(base).await,
        AuthSubcommand::Logout => run_logout(base, false).await,
        AuthSubcommand::Logoutall => run_logout(base, true).await,
        AuthSubcommand::Profile => {
            let client = Client::new(base.config()?);
            print_data(&client.profile().await?);
            Ok(())
        }
        AuthSubcommand::Activity => {
            let client = Client::new(base.config()?);
            print_data(&client.activity().await?);
            Ok(())
        }
    }
}

pub async fn run_admin(base: BaseArgs, args: AdminArgs) -> Result<()> {
    let client = Client::new(base.config()?);
    let data = match args.command {
        AdminSubcommand::Waiting => client.waiting().await?,
        AdminSubcommand::Approve(args) => client.approve(&args.username).await?,
        AdminSubcommand::SiteUsers => client.site_users().await?,
        AdminSubcommand::AllUsers => client.all_users().await?,
    };
    print_data(&data);
    Ok(())
}

async fn run_register(base: BaseArgs, args: RegisterArgs) -> Result<()> {
    let domain = match base.domain {
        Some(domain) => domain,
        None => prompt("Domain")?,
    };
    let registration = Registration {
        first_name: or_prompt(args.first_name, "First name")?,
        last_name: or_prompt(args.last_name, "Last name")?,
        email: or_prompt(args.email, "Email")?,
        site: or_prompt(args.site, "Site")?,
        password: Password::new().with_prompt("Password").interact()?,
    };
    print_data(&Client::register(&domain, &registration).await?);
    print_command_status(CommandStatus::Success, "registered");
    Ok(())
}

async fn run_login(base: BaseArgs) -> Result<()> {
    let username = match base.username.clone() {
        Some(username) => Some(username),
        None => Some(prompt("Username")?),
    };
    let password = match base.password.clone() {
        Some(password) => Some(password),
        None if std::env::var(cairn::config::PASSWORD_VAR).is_ok() => None,
        None => Some(Password::new().with_prompt("Password").interact()?),
    };
    let config = Config::resolve(base.domain.clone(), None, username, password)?;
    let client = Client::new(config);
    print_data(&client.login().await?);
    print_command_status(CommandStatus::Success, "logged in");
    Ok(())
}

async fn run_logout(base: BaseArgs, all: bool) -> Result<()> {
    let client = Client::new(base.config()?);
    if all {
        client.logout_all().await?;
    } else {
        client.logout().await?;
    }
    print_command_status(CommandStatus::Success, "logged out");
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    Ok(Input::<String>::new()
        .with_prompt(label)
        .interact_text()?
        .trim()
        .to_string())
}

fn or_prompt(value: Option<String>, label: &str) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None => prompt(label),
    }
}
