use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use cairn::{Client, CsvOptions, CsvUpload, HttpTransport, Select, DEFAULT_DELIMITER, TAB_DELIMITER};

use crate::args::BaseArgs;
use crate::cmd::{grouped_fields, unique_fields};
use crate::ui::{print_command_status, print_data, print_response, CommandStatus};

#[derive(Debug, Clone, Args)]
pub struct GetArgs {
    /// Name of the project
    pub project: String,

    /// Unique identifier of the record
    pub cairn_id: Option<String>,

    /// Field filters that uniquely identify the record, as FIELD=VALUE
    #[arg(short = 'f', long = "field", value_name = "FIELD=VALUE")]
    pub field: Vec<String>,

    /// Fields to include in the output
    #[arg(short = 'i', long)]
    pub include: Vec<String>,

    /// Fields to exclude from the output
    #[arg(short = 'e', long)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    /// Name of the project
    pub project: String,

    /// Field filters, as FIELD=VALUE; repeat a field for multi-value lookups
    #[arg(short = 'f', long = "field", value_name = "FIELD=VALUE")]
    pub field: Vec<String>,

    /// Fields to include in the output
    #[arg(short = 'i', long)]
    pub include: Vec<String>,

    /// Fields to exclude from the output
    #[arg(short = 'e', long)]
    pub exclude: Vec<String>,

    /// Return value frequencies for the given field(s)
    #[arg(short = 's', long)]
    pub summarise: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct CreateArgs {
    /// Name of the project
    pub project: String,

    /// Record fields, as FIELD=VALUE. With --csv these override row fields.
    #[arg(short = 'f', long = "field", value_name = "FIELD=VALUE")]
    pub field: Vec<String>,

    /// Create one record per row of this delimited file
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Read the file as tab-separated
    #[arg(long)]
    pub tsv: bool,

    /// Allow files holding more than one record
    #[arg(long)]
    pub multiline: bool,

    /// Run as a test (dry-run endpoint)
    #[arg(long)]
    pub test: bool,

    /// Upload rows through this many concurrent requests. Requires a
    /// password from the environment; outcomes arrive in completion order.
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct UpdateArgs {
    /// Name of the project
    pub project: String,

    /// Unique identifier of the record
    pub cairn_id: Option<String>,

    /// Record fields, as FIELD=VALUE. With --csv these override row fields.
    #[arg(short = 'f', long = "field", value_name = "FIELD=VALUE")]
    pub field: Vec<String>,

    /// Update one record per row of this delimited file
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Read the file as tab-separated
    #[arg(long)]
    pub tsv: bool,

    /// Allow files holding more than one record
    #[arg(long)]
    pub multiline: bool,

    /// Run as a test (dry-run endpoint)
    #[arg(long)]
    pub test: bool,
}

#[derive(Debug, Clone, Args)]
pub struct DeleteArgs {
    /// Name of the project
    pub project: String,

    /// Unique identifier of the record
    pub cairn_id: Option<String>,

    /// Delete one record per row of this delimited file
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Read the file as tab-separated
    #[arg(long)]
    pub tsv: bool,

    /// Allow files holding more than one record
    #[arg(long)]
    pub multiline: bool,
}

#[derive(Debug, Clone, Args)]
pub struct HistoryArgs {
    /// Name of the project
    pub project: String,
    /// Unique identifier of the record
    pub cairn_id: String,
}

#[derive(Debug, Clone, Args)]
pub struct IdentifyArgs {
    /// Name of the project
    pub project: String,
    /// Field on the project
    pub field: String,
    /// Value to identify
    pub value: String,
    /// Site to identify the value on (defaults to the user's site)
    #[arg(long)]
    pub site: Option<String>,
}

pub async fn run_get(base: BaseArgs, args: GetArgs) -> Result<()> {
    let client = Client::new(base.config()?);
    let select = Select {
        include: args.include,
        exclude: args.exclude,
        ..Select::default()
    };
    let record = match &args.cairn_id {
        Some(cairn_id) => {
            if !args.field.is_empty() {
                bail!("cannot provide both a 'cairn_id' and field filters");
            }
            client.get(&args.project, cairn_id, &select).await?
        }
        None => {
            let fields = grouped_fields(&args.field)?;
            client.find(&args.project, &fields, &select).await?
        }
    };
    print_data(&record);
    Ok(())
}

pub async fn run_filter(base: BaseArgs, args: FilterArgs) -> Result<()> {
    let client = Client::new(base.config()?);
    let fields = grouped_fields(&args.field)?;
    let select = Select {
        include: args.include,
        exclude: args.exclude,
        summarise: args.summarise,
    };
    let mut records = client.filter(&args.project, &fields, &select)?;
    while let Some(record) = records.next_record().await {
        println!("{}", record?);
    }
    Ok(())
}

pub async fn run_create(base: BaseArgs, args: CreateArgs) -> Result<()> {
    let client = Client::new(base.config()?);
    match &args.csv {
        Some(path) => {
            let options = CsvOptions {
                overrides: non_empty(unique_fields(&args.field)?),
                delimiter: Some(delimiter(args.tsv)),
                multiline: args.multiline,
                test: args.test,
            };
            let upload = client.csv_create(&args.project, open_csv(path)?, options)?;
            match args.workers {
                Some(workers) => {
                    let outcomes = upload.run_concurrent(workers).await?;
                    summarize(outcomes.into_iter())
                }
                None => drain_upload(upload).await,
            }
        }
        None => {
            let fields = unique_fields(&args.field)?;
            if fields.is_empty() {
                bail!("must provide fields or a CSV file");
            }
            print_data(&client.create(&args.project, &fields, args.test).await?);
            Ok(())
        }
    }
}

pub async fn run_update(base: BaseArgs, args: UpdateArgs) -> Result<()> {
    let client = Client::new(base.config()?);
    match &args.csv {
        Some(path) => {
            let options = CsvOptions {
                overrides: non_empty(unique_fields(&args.field)?),
                delimiter: Some(delimiter(args.tsv)),
                multiline: args.multiline,
                test: args.test,
            };
            let upload = client.csv_update(&args.project, open_csv(path)?, options)?;
            drain_upload(upload).await
        }
        None => {
            let Some(cairn_id) = &args.cairn_id else {
                bail!("must provide a 'cairn_id' or a CSV file");
            };
            let fields = unique_fields(&args.field)?;
            print_data(
                &client
                    .update(&args.project, cairn_id, &fields, args.test)
                    .await?,
            );
            Ok(())
        }
    }
}

pub async fn run_delete(base: BaseArgs, args: DeleteArgs) -> Result<()> {
    let client = Client::new(base.config()?);
    match &args.csv {
        Some(path) => {
            let upload = client.csv_delete(
                &args.project,
                open_csv(path)?,
                Some(delimiter(args.tsv)),
                args.multiline,
            )?;
            drain_upload(upload).await
        }
        None => {
            let Some(cairn_id) = &args.cairn_id else {
                bail!("must provide a 'cairn_id' or a CSV file");
            };
            print_data(&client.delete(&args.project, cairn_id).await?);
            Ok(())
        }
    }
}

pub async fn run_history(base: BaseArgs, args: HistoryArgs) -> Result<()> {
    let client = Client::new(base.config()?);
    print_data(&client.history(&args.project, &args.cairn_id).await?);
    Ok(())
}

pub async fn run_identify(base: BaseArgs, args: IdentifyArgs) -> Result<()> {
    let client = Client::new(base.config()?);
    print_data(
        &client
            .identify(&args.project, &args.field, &args.value, args.site.as_deref())
            .await?,
    );
    Ok(())
}

fn delimiter(tsv: bool) -> u8 {
    if tsv {
        TAB_DELIMITER
    } else {
        DEFAULT_DELIMITER
    }
}

fn open_csv(path: &PathBuf) -> Result<File> {
    File::open(path).with_context(|| format!("failed to open {}", path.display()))
}

fn non_empty(fields: cairn::Row) -> Option<cairn::Row> {
    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

/// Stream upload outcomes, printing each as it lands, then a summary.
async fn drain_upload<R: std::io::Read>(
    mut upload: CsvUpload<'_, HttpTransport, R>,
) -> Result<()> {
    let mut tally = Tally::default();
    while let Some(outcome) = upload.next_outcome().await {
        tally.record(outcome);
    }
    tally.finish();
    Ok(())
}

fn summarize(outcomes: impl Iterator<Item = cairn::Result<cairn::ApiResponse>>) -> Result<()> {
    let mut tally = Tally::default();
    for outcome in outcomes {
        tally.record(outcome);
    }
    tally.finish();
    Ok(())
}

#[derive(Default)]
struct Tally {
    attempted: usize,
    successes: usize,
    failures: usize,
}

impl Tally {
    fn record(&mut self, outcome: cairn::Result<cairn::ApiResponse>) {
        self.attempted += 1;
        match outcome {
            Ok(response) => {
                if response.ok() {
                    self.successes += 1;
                } else {
                    self.failures += 1;
                }
                print_response(&response);
            }
            Err(error) => {
                self.failures += 1;
                print_command_status(CommandStatus::Error, &error.to_string());
            }
        }
    }

    fn finish(&self) {
        eprintln!("[UPLOADS]");
        eprintln!("Attempted: {}", self.attempted);
        eprintln!("Successes: {}", self.successes);
        eprintln!("Failures: {}", self.failures);
    }
}
