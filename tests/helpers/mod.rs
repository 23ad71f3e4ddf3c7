//! Test helpers and fixtures
//!
//! In-memory tables implementing the source and destination traits so the
//! pipeline can be exercised without a DynamoDB endpoint.
#![allow(dead_code)]

pub mod fixtures;

pub use dynamo_table_copier::table::{
    DestinationTable, Page, PageCursor, RangeFilter, Record, RetryConfig, SourceTable,
    WriteOutcome, describe_key,
};
pub use dynamo_table_copier::Error;
pub use serde::{Deserialize, Serialize};

pub use fixtures::{Reading, key_names, readings};

use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

const OFFSET_KEY: &str = "offset";

/// Retry policy with millisecond delays so tests stay fast
pub fn fast_retries(max_retries: usize) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    }
}

/// Source table that evaluates `physical_page_size` items per request
///
/// Mirrors DynamoDB: the filter is applied after the page is read, so a page
/// can come back empty while the cursor says there is more.
pub struct MemorySource {
    items: Vec<Record>,
    physical_page_size: usize,
    cursors: Mutex<Vec<Option<usize>>>,
    fail_on_request: Option<usize>,
}

impl MemorySource {
    pub fn new(items: Vec<Record>, physical_page_size: usize) -> Self {
        Self {
            items,
            physical_page_size: physical_page_size.max(1),
            cursors: Mutex::new(Vec::new()),
            fail_on_request: None,
        }
    }

    pub fn from_readings(readings: &[Reading], physical_page_size: usize) -> Self {
        Self::new(
            readings.iter().map(Reading::record).collect(),
            physical_page_size,
        )
    }

    /// Make the `n`-th request (0-based) fail with a scan error
    pub fn failing_on(mut self, request: usize) -> Self {
        self.fail_on_request = Some(request);
        self
    }

    /// Offsets received as cursors, in request order
    pub fn cursors(&self) -> Vec<Option<usize>> {
        self.cursors.lock().unwrap().clone()
    }

    pub fn requests(&self) -> usize {
        self.cursors.lock().unwrap().len()
    }
}

fn offset_of(cursor: PageCursor) -> usize {
    match cursor.into_inner().get(OFFSET_KEY) {
        Some(AttributeValue::N(n)) => n.parse().unwrap(),
        other => panic!("unexpected cursor {other:?}"),
    }
}

impl SourceTable for MemorySource {
    fn table_name(&self) -> &str {
        "memory_source"
    }

    async fn scan_page(
        &self,
        filter: &RangeFilter,
        cursor: Option<PageCursor>,
        limit: Option<i32>,
    ) -> Result<Page, Error> {
        let offset = cursor.map(offset_of);
        let request = {
            let mut cursors = self.cursors.lock().unwrap();
            cursors.push(offset);
            cursors.len() - 1
        };

        if self.fail_on_request == Some(request) {
            return Err(scan_failure());
        }

        let start = offset.unwrap_or(0);
        let size = limit
            .map(|l| l as usize)
            .unwrap_or(self.physical_page_size)
            .min(self.physical_page_size);
        let end = (start + size).min(self.items.len());

        let records = self.items[start..end]
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();

        let cursor = (end < self.items.len()).then(|| {
            PageCursor::new(HashMap::from([(
                OFFSET_KEY.to_string(),
                AttributeValue::N(end.to_string()),
            )]))
        });

        Ok(Page {
            records,
            cursor,
            scanned_count: end - start,
        })
    }
}

/// A scan error as the SDK would report an unreachable endpoint
pub fn scan_failure() -> Error {
    use aws_sdk_dynamodb::operation::scan::ScanError;
    use aws_smithy_runtime_api::client::result::SdkError;

    Error::ScanFailure(SdkError::<ScanError, _>::timeout_error("connection timed out"))
}

/// Destination table with put-overwrite semantics and scripted rejections
pub struct MemoryDestination {
    max_batch_size: usize,
    items: Mutex<BTreeMap<String, Record>>,
    request_sizes: Mutex<Vec<usize>>,
    attempts: Mutex<HashMap<String, usize>>,
    rejections_per_record: usize,
    always_reject: HashSet<String>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self {
            max_batch_size: 25,
            items: Mutex::new(BTreeMap::new()),
            request_sizes: Mutex::new(Vec::new()),
            attempts: Mutex::new(HashMap::new()),
            rejections_per_record: 0,
            always_reject: HashSet::new(),
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Reject every record this many times before accepting it
    pub fn rejecting_each(mut self, times: usize) -> Self {
        self.rejections_per_record = times;
        self
    }

    /// Never accept this record
    pub fn rejecting_forever(mut self, record: &Record) -> Self {
        let _ = self.always_reject.insert(Self::key_of(record));
        self
    }

    pub fn key_of(record: &Record) -> String {
        describe_key(record, &key_names())
    }

    /// Stored items keyed by their rendered primary key
    pub fn items(&self) -> BTreeMap<String, Record> {
        self.items.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn contains(&self, record: &Record) -> bool {
        self.items.lock().unwrap().contains_key(&Self::key_of(record))
    }

    /// Sizes of every batch write request received
    pub fn request_sizes(&self) -> Vec<usize> {
        self.request_sizes.lock().unwrap().clone()
    }
}

impl DestinationTable for MemoryDestination {
    fn table_name(&self) -> &str {
        "memory_destination"
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    fn key_attribute_names(&self) -> Vec<String> {
        key_names()
    }

    async fn write_batch(&self, records: Vec<Record>) -> Result<WriteOutcome, Error> {
        assert!(
            records.len() <= self.max_batch_size,
            "request of {} items exceeds the limit of {}",
            records.len(),
            self.max_batch_size
        );
        self.request_sizes.lock().unwrap().push(records.len());

        let mut attempts = self.attempts.lock().unwrap();
        let mut items = self.items.lock().unwrap();
        let mut accepted = 0;
        let mut unprocessed = Vec::new();

        for record in records {
            let key = Self::key_of(&record);
            let seen = attempts.entry(key.clone()).or_insert(0);
            *seen += 1;

            if self.always_reject.contains(&key) || *seen <= self.rejections_per_record {
                unprocessed.push(record);
            } else {
                let _ = items.insert(key, record);
                accepted += 1;
            }
        }

        Ok(WriteOutcome::new(accepted, unprocessed))
    }
}
