mod batch;
mod helpers;
mod operations;
mod scan;
mod types;

pub use batch::{BatchWriteOutput, BatchWriter, WriteOutcome};
pub use helpers::batch_processor::DEFAULT_CONCURRENCY as DEFAULT_WRITE_CONCURRENCY;
pub use operations::{DestinationTable, DynamoDbTable, SourceTable};
pub use scan::RangeScanner;
pub use types::{
    Page, PageCursor, RangeFilter, Record, RetryConfig, TIMESTAMP_ATTRIBUTE, TimeWindow,
    describe_key, record_timestamp,
};
