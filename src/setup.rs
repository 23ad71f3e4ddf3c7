use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableOutput;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ProvisionedThroughput,
    TableDescription, TableStatus,
};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::error::Error;

/// Capacity used when the source reports none
const DEFAULT_CAPACITY_UNITS: i64 = 5;
const WAIT_ATTEMPTS: usize = 30;
const WAIT_INTERVAL: Duration = Duration::from_secs(2);

/// The parts of a table description needed to recreate it elsewhere
#[derive(Clone, Debug, PartialEq)]
pub struct TableSchema {
    /// Table name
    pub table_name: String,
    /// Partition key first, then the optional sort key
    pub key_schema: Vec<KeySchemaElement>,
    /// Every attribute definition reported by DescribeTable, index keys included
    pub attribute_definitions: Vec<AttributeDefinition>,
    /// Provisioned or on-demand
    pub billing_mode: BillingMode,
    /// Provisioned read capacity, `0` when unknown
    pub read_capacity_units: i64,
    /// Provisioned write capacity, `0` when unknown
    pub write_capacity_units: i64,
    /// Table status at the time of the description
    pub status: Option<TableStatus>,
}

impl TableSchema {
    /// Extract the schema from a DescribeTable / CreateTable description
    pub fn from_description(description: TableDescription) -> Self {
        let billing_mode = description
            .billing_mode_summary
            .and_then(|summary| summary.billing_mode)
            .unwrap_or(BillingMode::Provisioned);

        let (read_capacity_units, write_capacity_units) = description
            .provisioned_throughput
            .map(|throughput| {
                (
                    throughput.read_capacity_units.unwrap_or_default(),
                    throughput.write_capacity_units.unwrap_or_default(),
                )
            })
            .unwrap_or_default();

        let mut key_schema = description.key_schema.unwrap_or_default();
        key_schema.sort_by_key(|element| element.key_type != KeyType::Hash);

        Self {
            table_name: description.table_name.unwrap_or_default(),
            key_schema,
            attribute_definitions: description.attribute_definitions.unwrap_or_default(),
            billing_mode,
            read_capacity_units,
            write_capacity_units,
            status: description.table_status,
        }
    }

    /// Primary key attribute names, partition key first
    pub fn key_names(&self) -> Vec<String> {
        self.key_schema
            .iter()
            .map(|element| element.attribute_name.clone())
            .collect()
    }

    /// Whether the table accepts reads and writes
    pub fn is_active(&self) -> bool {
        self.status == Some(TableStatus::Active)
    }

    /// Attribute definitions restricted to the primary key
    ///
    /// CreateTable rejects definitions for attributes that no key schema uses.
    pub fn key_attribute_definitions(&self) -> Vec<AttributeDefinition> {
        let key_names = self.key_names();
        self.attribute_definitions
            .iter()
            .filter(|definition| key_names.contains(&definition.attribute_name))
            .cloned()
            .collect()
    }

    /// Read/write capacity to provision, falling back to 5/5
    pub fn capacity_units(&self) -> (i64, i64) {
        let or_default = |units: i64| {
            if units > 0 {
                units
            } else {
                DEFAULT_CAPACITY_UNITS
            }
        };
        (
            or_default(self.read_capacity_units),
            or_default(self.write_capacity_units),
        )
    }
}

/// Describe a table
pub async fn describe_table(client: &Client, table_name: &str) -> Result<TableSchema, Error> {
    let output = client.describe_table().table_name(table_name).send().await?;
    schema_from_output(table_name, output)
}

fn schema_from_output(
    table_name: &str,
    output: DescribeTableOutput,
) -> Result<TableSchema, Error> {
    output
        .table
        .map(TableSchema::from_description)
        .ok_or_else(|| Error::MissingDescription(table_name.to_string()))
}

/// Create the destination table with the source's primary key, or fetch it if it exists
///
/// Throughput is copied from the source (5/5 when the source reports none) and
/// on-demand sources produce on-demand destinations. Waits until the table is `ACTIVE`.
pub async fn ensure_destination(
    client: &Client,
    table_name: &str,
    source: &TableSchema,
) -> Result<TableSchema, Error> {
    let mut builder = client
        .create_table()
        .table_name(table_name)
        .set_key_schema(Some(source.key_schema.clone()))
        .set_attribute_definitions(Some(source.key_attribute_definitions()));

    builder = if source.billing_mode == BillingMode::PayPerRequest {
        builder.billing_mode(BillingMode::PayPerRequest)
    } else {
        let (read, write) = source.capacity_units();
        builder.provisioned_throughput(
            ProvisionedThroughput::builder()
                .read_capacity_units(read)
                .write_capacity_units(write)
                .build()?,
        )
    };

    // Ignore ResourceInUseException - table already exists
    match builder.send().await {
        Ok(_) => info!(table = table_name, "created destination table"),
        Err(e) => {
            if matches!(
                e.as_service_error(),
                Some(CreateTableError::ResourceInUseException(_))
            ) {
                debug!(table = table_name, "destination table already exists");
            } else {
                return Err(e.into());
            }
        }
    }

    wait_until_active(client, table_name).await
}

/// Poll DescribeTable until the table is `ACTIVE`
pub async fn wait_until_active(client: &Client, table_name: &str) -> Result<TableSchema, Error> {
    for attempt in 0..WAIT_ATTEMPTS {
        let schema = describe_table(client, table_name).await?;
        if schema.is_active() {
            return Ok(schema);
        }

        debug!(
            table = table_name,
            status = ?schema.status,
            attempt,
            "waiting for table to become active"
        );
        sleep(WAIT_INTERVAL).await;
    }

    Err(Error::TableNotReady(table_name.to_string()))
}
