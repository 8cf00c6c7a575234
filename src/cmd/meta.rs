use anyhow::Result;
use clap::Args;

use cairn::Client;

use crate::args::BaseArgs;
use crate::ui::print_data;

#[derive(Debug, Clone, Args)]
pub struct EmptyArgs {}

#[derive(Debug, Clone, Args)]
pub struct FieldsArgs {
    /// Name of the project
    pub project: String,
}

#[derive(Debug, Clone, Args)]
pub struct ChoicesArgs {
    /// Name of the project
    pub project: String,
    /// Choice field on the project
    pub field: String,
}

pub async fn run_projects(base: BaseArgs) -> Result<()> {
    let client = Client::new(base.config()?);
    print_data(&client.projects().await?);
    Ok(())
}

pub async fn run_types(base: BaseArgs) -> Result<()> {
    let client = Client::new(base.config()?);
    print_data(&client.types().await?);
    Ok(())
}

pub async fn run_lookups(base: BaseArgs) -> Result<()> {
    let client = Client::new(base.config()?);
    print_data(&client.lookups().await?);
    Ok(())
}

pub async fn run_fields(base: BaseArgs, args: FieldsArgs) -> Result<()> {
    let client = Client::new(base.config()?);
    print_data(&client.fields(&args.project).await?);
    Ok(())
}

pub async fn run_choices(base: BaseArgs, args: ChoicesArgs) -> Result<()> {
    let client = Client::new(base.config()?);
    print_data(&client.choices(&args.project, &args.field).await?);
    Ok(())
}
