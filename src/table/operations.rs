use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemOutput;
use aws_sdk_dynamodb::operation::batch_write_item::builders::BatchWriteItemFluentBuilder;
use aws_sdk_dynamodb::operation::scan::ScanOutput;
use aws_sdk_dynamodb::operation::scan::builders::ScanFluentBuilder;
use aws_sdk_dynamodb::types::{PutRequest, ReturnConsumedCapacity, WriteRequest};
use std::future::Future;

use crate::error::Error;
use crate::table::batch::WriteOutcome;
use crate::table::helpers::{batch_processor, expressions};
use crate::table::types::{Page, PageCursor, RangeFilter, Record};

/// Table that records are scanned out of
///
/// Implemented by [`DynamoDbTable`]; tests plug in in-memory tables.
pub trait SourceTable: Sync {
    /// Name used in progress and error messages
    fn table_name(&self) -> &str;

    /// Issue one filtered scan request
    ///
    /// `cursor` is the token returned by the previous page, `None` on the first call.
    /// `limit` caps how many items the server evaluates before filtering.
    fn scan_page(
        &self,
        filter: &RangeFilter,
        cursor: Option<PageCursor>,
        limit: Option<i32>,
    ) -> impl Future<Output = Result<Page, Error>> + Send;
}

/// Table that records are written into
pub trait DestinationTable: Sync {
    /// Name used in progress and error messages
    fn table_name(&self) -> &str;

    /// Protocol ceiling on items per batch write request
    fn max_batch_size(&self) -> usize {
        batch_processor::BATCH_WRITE_SIZE
    }

    /// Primary key attribute names, used to identify records in error reports
    fn key_attribute_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Issue one batch write request of at most [`max_batch_size`](Self::max_batch_size) records
    ///
    /// Records the destination did not accept come back in [`WriteOutcome::unprocessed`].
    fn write_batch(
        &self,
        records: Vec<Record>,
    ) -> impl Future<Output = Result<WriteOutcome, Error>> + Send;
}

/// DynamoDB table handle backed by an explicitly constructed client
///
/// # Example
///
/// ```rust,no_run
/// use dynamo_table_copier::table::DynamoDbTable;
///
/// # async fn example() {
/// let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
///     .region(aws_config::Region::new("us-west-2"))
///     .load()
///     .await;
/// let client = aws_sdk_dynamodb::Client::new(&config);
/// let table = DynamoDbTable::new(client, "readings")
///     .with_key_names(vec!["device_id".to_string(), "timestamp".to_string()]);
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DynamoDbTable {
    client: Client,
    table_name: String,
    key_names: Vec<String>,
}

impl DynamoDbTable {
    /// Create a handle for `table_name`
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            key_names: Vec::new(),
        }
    }

    /// Attach the table's primary key attribute names
    pub fn with_key_names(mut self, key_names: Vec<String>) -> Self {
        self.key_names = key_names;
        self
    }

    /// Underlying DynamoDB client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl DynamoDbTable {
    fn scan_request(
        &self,
        filter: &RangeFilter,
        cursor: Option<PageCursor>,
        limit: Option<i32>,
    ) -> ScanFluentBuilder {
        let compiled = expressions::range_filter(filter);

        self.client
            .scan()
            .table_name(&self.table_name)
            .filter_expression(compiled.expression)
            .set_expression_attribute_names(Some(compiled.names))
            .set_expression_attribute_values(Some(compiled.values))
            .set_exclusive_start_key(cursor.map(PageCursor::into_inner))
            .set_limit(limit)
    }

    fn batch_write_request(
        &self,
        records: Vec<Record>,
    ) -> Result<BatchWriteItemFluentBuilder, Error> {
        let mut write_ops: Vec<WriteRequest> = Vec::with_capacity(records.len());

        for item in records {
            let put_request = PutRequest::builder().set_item(Some(item)).build()?;

            write_ops.push(
                WriteRequest::builder()
                    .set_put_request(Some(put_request))
                    .build(),
            );
        }

        Ok(self
            .client
            .batch_write_item()
            .request_items(&self.table_name, write_ops)
            .return_consumed_capacity(ReturnConsumedCapacity::Total))
    }
}

/// Empty `LastEvaluatedKey` maps count as the end of the scan
fn page_from_output(output: ScanOutput) -> Page {
    let cursor = output
        .last_evaluated_key
        .filter(|key| !key.is_empty())
        .map(PageCursor::new);

    Page {
        records: output.items.unwrap_or_default(),
        cursor,
        scanned_count: output.scanned_count.max(0) as usize,
    }
}

fn outcome_from_output(submitted: usize, output: BatchWriteItemOutput) -> WriteOutcome {
    let unprocessed: Vec<Record> = output
        .unprocessed_items
        .unwrap_or_default()
        .into_values()
        .flatten()
        .filter_map(|request| request.put_request.map(|put| put.item))
        .collect();

    WriteOutcome {
        accepted: submitted.saturating_sub(unprocessed.len()),
        unprocessed,
        consumed_capacity: output.consumed_capacity.unwrap_or_default(),
    }
}

impl SourceTable for DynamoDbTable {
    fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn scan_page(
        &self,
        filter: &RangeFilter,
        cursor: Option<PageCursor>,
        limit: Option<i32>,
    ) -> Result<Page, Error> {
        let output = self.scan_request(filter, cursor, limit).send().await?;
        Ok(page_from_output(output))
    }
}

impl DestinationTable for DynamoDbTable {
    fn table_name(&self) -> &str {
        &self.table_name
    }

    fn key_attribute_names(&self) -> Vec<String> {
        self.key_names.clone()
    }

    async fn write_batch(&self, records: Vec<Record>) -> Result<WriteOutcome, Error> {
        if records.is_empty() {
            return Ok(WriteOutcome::default());
        }

        let submitted = records.len();
        let output = self.batch_write_request(records)?.send().await?;
        Ok(outcome_from_output(submitted, output))
    }
}
