use aws_sdk_dynamodb::Client;
use clap::Parser;
use dynamo_table_copier::{
    CopierConfig, CopyOptions, Error, TableCopier, setup, table::DynamoDbTable,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dynamo-table-copier",
    version,
    about = "Copy a time-range slice of a DynamoDB table into another table"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short, default_value = "config.toml", env = "COPIER_CONFIG")]
    config: PathBuf,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), Error> {
    let config = CopierConfig::load(&cli.config)?;
    let filter = config.range_filter()?;

    let source_client = Client::new(&config.source_sdk_config().await);
    let destination_client = Client::new(&config.destination_sdk_config().await);

    let source_schema = setup::describe_table(&source_client, &config.source_table_name).await?;
    let destination_schema = setup::ensure_destination(
        &destination_client,
        &config.destination_table_name,
        &source_schema,
    )
    .await?;

    info!(
        source = %config.source_table_name,
        destination = %config.destination_table_name,
        keys = ?destination_schema.key_names(),
        "tables ready"
    );

    let source = DynamoDbTable::new(source_client, &config.source_table_name)
        .with_key_names(source_schema.key_names());
    let destination = DynamoDbTable::new(destination_client, &config.destination_table_name)
        .with_key_names(destination_schema.key_names());

    let summary = TableCopier::new(&source, &destination, CopyOptions::from_config(&config))
        .run(filter)
        .await?;

    info!(
        copied = summary.copied,
        pages = summary.pages,
        "Complete! Copied {} items from {} to {}",
        summary.copied,
        config.source_table_name,
        config.destination_table_name
    );

    Ok(())
}
