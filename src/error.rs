use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_runtime_api::http::Response;
use std::error::Error as StdError;
use std::fmt;

use crate::config::ConfigError;
use crate::table::{Record, describe_key};

type DynamoScanError = SdkError<ScanError, Response>;
type DynamoBatchWriteItemError = SdkError<BatchWriteItemError, Response>;
type DynamoCreateTableError = SdkError<CreateTableError, Response>;
type DynamoDescribeTableError = SdkError<DescribeTableError, Response>;

/// Number of unprocessed record keys spelled out in a `WriteExhausted` message
const REPORTED_KEYS: usize = 10;

/// Table copy error
#[derive(Debug)]
pub enum Error {
    /// Scan request against the source table failed; the run stops without retrying
    ScanFailure(DynamoScanError),
    /// BatchWriteItem request against the destination table failed outright
    BatchWriteFailure(DynamoBatchWriteItemError),
    /// Records still unprocessed after every retry attempt
    WriteExhausted {
        /// Destination table name
        table: String,
        /// Records the destination never acknowledged
        unprocessed: Vec<Record>,
        /// Primary key attribute names, used to identify the records
        key_names: Vec<String>,
    },
    /// Time window with `start_ms >= end_ms`
    InvalidTimeWindow {
        /// Inclusive lower bound in milliseconds since epoch
        start_ms: i64,
        /// Exclusive upper bound in milliseconds since epoch
        end_ms: i64,
    },
    /// Configuration could not be loaded
    Configuration(ConfigError),
    /// DynamoDB DescribeTable operation error
    DescribeTable(DynamoDescribeTableError),
    /// DynamoDB CreateTable operation error
    CreateTable(DynamoCreateTableError),
    /// Destination table did not reach the `ACTIVE` state in time
    TableNotReady(String),
    /// DescribeTable succeeded but returned no table description
    MissingDescription(String),
    /// DynamoDB request builder error
    BuildError(BuildError),
}

impl Error {
    /// Check if the error is a scan failure on the source table
    pub fn is_scan_failure(&self) -> bool {
        matches!(self, Error::ScanFailure(_))
    }

    /// Check if the error reports records left unprocessed after all retries
    pub fn is_write_exhausted(&self) -> bool {
        matches!(self, Error::WriteExhausted { .. })
    }

    /// Records the destination never acknowledged, if this is a `WriteExhausted` error
    ///
    /// The operator can resubmit these manually.
    pub fn unprocessed_records(&self) -> Option<&[Record]> {
        match self {
            Error::WriteExhausted { unprocessed, .. } => Some(unprocessed),
            _ => None,
        }
    }
}

macro_rules! impl_from_error {
    ($name:ident, $variant:ident) => {
        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::$variant(e)
            }
        }
    };
}

impl_from_error!(DynamoScanError, ScanFailure);
impl_from_error!(DynamoBatchWriteItemError, BatchWriteFailure);
impl_from_error!(DynamoDescribeTableError, DescribeTable);
impl_from_error!(DynamoCreateTableError, CreateTable);
impl_from_error!(ConfigError, Configuration);
impl_from_error!(BuildError, BuildError);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ScanFailure(e) => write!(f, "DynamoDB Scan operation failed: {}", e),
            Error::BatchWriteFailure(e) => {
                write!(f, "DynamoDB BatchWriteItem operation failed: {}", e)
            }
            Error::WriteExhausted {
                table,
                unprocessed,
                key_names,
            } => {
                write!(
                    f,
                    "{} record(s) left unprocessed in '{}' after all retries:",
                    unprocessed.len(),
                    table
                )?;
                for record in unprocessed.iter().take(REPORTED_KEYS) {
                    write!(f, " {}", describe_key(record, key_names))?;
                }
                if unprocessed.len() > REPORTED_KEYS {
                    write!(f, " ... and {} more", unprocessed.len() - REPORTED_KEYS)?;
                }
                Ok(())
            }
            Error::InvalidTimeWindow { start_ms, end_ms } => write!(
                f,
                "invalid time window: start {} must be before end {}",
                start_ms, end_ms
            ),
            Error::Configuration(e) => write!(f, "configuration error: {}", e),
            Error::DescribeTable(e) => {
                write!(f, "DynamoDB DescribeTable operation failed: {}", e)
            }
            Error::CreateTable(e) => write!(f, "DynamoDB CreateTable operation failed: {}", e),
            Error::TableNotReady(table) => {
                write!(f, "DynamoDB table '{}' did not become ACTIVE", table)
            }
            Error::MissingDescription(table) => {
                write!(f, "DescribeTable returned no description for '{}'", table)
            }
            Error::BuildError(e) => write!(f, "DynamoDB request builder error: {}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::ScanFailure(e) => Some(e),
            Error::BatchWriteFailure(e) => Some(e),
            Error::Configuration(e) => Some(e),
            Error::DescribeTable(e) => Some(e),
            Error::CreateTable(e) => Some(e),
            Error::BuildError(e) => Some(e),
            Error::WriteExhausted { .. }
            | Error::InvalidTimeWindow { .. }
            | Error::TableNotReady(_)
            | Error::MissingDescription(_) => None,
        }
    }
}
