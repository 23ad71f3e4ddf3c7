//! # DynamoDB Table Copier
//!
//! Replicates a time-range slice of one DynamoDB table into another, e.g. across
//! regions, accounts, or into LocalStack:
//! - Paginated scan with a server-side `timestamp` range filter
//! - Chunked batch writes within the 25-item `BatchWriteItem` limit
//! - Automatic retry of unprocessed items with exponential backoff
//! - Destination table provisioning from the source key schema
//!
//! Delivery is at-least-once: every record inside the window as of scan time is
//! written, and rerunning a window converges to the same destination state because
//! writes overwrite by primary key.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dynamo_table_copier::{
//!     CopyOptions, Error, TableCopier,
//!     table::{DynamoDbTable, RangeFilter, TimeWindow},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let config = aws_config::defaults(aws_config::BehaviorVersion::latest()).load().await;
//!     let client = aws_sdk_dynamodb::Client::new(&config);
//!
//!     let source = DynamoDbTable::new(client.clone(), "readings");
//!     let destination = DynamoDbTable::new(client, "readings-backfill");
//!
//!     let window = TimeWindow::new(1_704_067_200_000, 1_706_745_600_000)?;
//!     let summary = TableCopier::new(&source, &destination, CopyOptions::default())
//!         .run(RangeFilter::new(window))
//!         .await?;
//!
//!     println!("copied {} records", summary.copied);
//!     Ok(())
//! }
//! ```
#![deny(
    bad_style,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unreachable_code,
    unused_mut
)]

mod error;
pub use error::Error;

/// Configuration loading
pub mod config;

/// Scan-then-write orchestration
pub mod copier;

/// Destination table provisioning
pub mod setup;

/// Source/destination tables, range scanner and batch writer
pub mod table;

pub use config::{ConfigError, CopierConfig};
pub use copier::{CopyOptions, CopySummary, TableCopier};

// Re-export aws-config types for configuration
pub use aws_config::{BehaviorVersion, Region, SdkConfig};
