use std::path::PathBuf;

use clap::Args;

use cairn::{Config, Error};

/// Connection flags shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct BaseArgs {
    /// Service domain (or via CAIRN_DOMAIN)
    #[arg(short = 'd', long, env = "CAIRN_DOMAIN", global = true)]
    pub domain: Option<String>,

    /// API token (or via CAIRN_TOKEN)
    #[arg(long, env = "CAIRN_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Username for login (or via CAIRN_USERNAME)
    #[arg(short = 'u', long, env = "CAIRN_USERNAME", global = true)]
    pub username: Option<String>,

    /// Password for login. Prefer CAIRN_PASSWORD over this flag.
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Path to a .env file to load before running commands.
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,
}

impl BaseArgs {
    /// Resolve flags plus environment into a validated config.
    pub fn config(&self) -> Result<Config, Error> {
        Config::resolve(
            self.domain.clone(),
            self.token.clone(),
            self.username.clone(),
            self.password.clone(),
        )
    }
}

#[derive(Debug, Clone, Args)]
pub struct CLIArgs<T: Args> {
    #[command(flatten)]
    pub base: BaseArgs,

    #[command(flatten)]
    pub args: T,
}
