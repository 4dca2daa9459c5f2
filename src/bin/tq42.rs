//! Command-line client for the TQ42 platform.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use tq42_sdk::{
    dataset, experiment, ClientConfig, Dataset, DatasetSensitivity, Experiment, NewDataset,
    Tq42Client,
};

/// TQ42 - manage experiments and datasets from the terminal
#[derive(Parser)]
#[command(name = "tq42")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML config file (defaults to TQ42_* environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// gRPC endpoint of the platform
    #[arg(long, global = true, env = "TQ42_HOST")]
    host: Option<String>,

    /// Access token
    #[arg(long, global = true, env = "TQ42_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Project that list and create commands run against
    #[arg(long, global = true, env = "TQ42_PROJECT_ID")]
    project: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, value_enum, default_value_t = LogFormat::Console, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Console,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and rename experiments
    #[command(subcommand)]
    Experiment(ExperimentCommand),

    /// Inspect, create and export datasets
    #[command(subcommand)]
    Dataset(DatasetCommand),
}

#[derive(Subcommand)]
enum ExperimentCommand {
    /// Show one experiment
    Get { id: String },

    /// List experiments of the selected project
    List,

    /// Rename an experiment
    Update {
        id: String,

        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum DatasetCommand {
    /// Show one dataset
    Get { id: String },

    /// List datasets of the selected project
    List,

    /// Create a dataset from a local file or a remote URL
    Create {
        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        description: String,

        /// public, general, sensitive or confidential
        #[arg(long)]
        sensitivity: DatasetSensitivity,

        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,

        #[arg(long)]
        url: Option<String>,
    },

    /// Download a dataset into an existing directory
    Export { id: String, directory: PathBuf },
}

/// Level used when `RUST_LOG` is unset.
fn default_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(verbose)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Console => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ClientConfig::from_env(),
    };
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(token) = &cli.token {
        config.access_token = Some(token.clone());
    }
    if let Some(project) = &cli.project {
        config.default_project_id = Some(project.clone());
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_experiment(client: &Tq42Client, command: ExperimentCommand) -> anyhow::Result<()> {
    match command {
        ExperimentCommand::Get { id } => {
            let exp = Experiment::get(client, &id).await?;
            print_json(exp.data())
        }
        ExperimentCommand::List => {
            let experiments = experiment::list_all(client, None).await?;
            let data: Vec<_> = experiments.iter().map(Experiment::data).collect();
            print_json(&data)
        }
        ExperimentCommand::Update { id, name } => {
            let mut exp = Experiment::get(client, &id).await?;
            exp.update(&name).await?;
            print_json(exp.data())
        }
    }
}

async fn run_dataset(client: &Tq42Client, command: DatasetCommand) -> anyhow::Result<()> {
    match command {
        DatasetCommand::Get { id } => {
            let ds = Dataset::get(client, &id).await?;
            print_json(ds.data())
        }
        DatasetCommand::List => {
            let datasets = dataset::list_all(client, None).await?;
            let data: Vec<_> = datasets.iter().map(Dataset::data).collect();
            print_json(&data)
        }
        DatasetCommand::Create {
            name,
            description,
            sensitivity,
            file,
            url,
        } => {
            let ds = Dataset::create(
                client,
                NewDataset {
                    project_id: None,
                    name,
                    description,
                    sensitivity,
                    file,
                    url,
                },
            )
            .await?;
            print_json(ds.data())
        }
        DatasetCommand::Export { id, directory } => {
            let ds = Dataset::get(client, &id).await?;
            let path = ds.export(&directory).await?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let config = load_config(&cli)?;
    let client = Tq42Client::connect(config)
        .await
        .context("connecting to TQ42")?;

    match cli.command {
        Commands::Experiment(command) => run_experiment(&client, command).await,
        Commands::Dataset(command) => run_dataset(&client, command).await,
    }
}
