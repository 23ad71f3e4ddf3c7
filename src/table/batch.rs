use aws_sdk_dynamodb::types::ConsumedCapacity;
use futures_util::{StreamExt, TryStreamExt};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_stream::{self as stream};
use tracing::{debug, warn};

use crate::Error;
use crate::table::helpers::{batch_processor, retry_config};
use crate::table::operations::DestinationTable;
use crate::table::types::{Record, RetryConfig};

/// Result of a single batch write request
///
/// The destination reports rejected records as unprocessed without saying why;
/// throttling and other transient causes look the same.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    /// Number of records the destination accepted
    pub accepted: usize,
    /// Records the destination did not accept in this attempt
    pub unprocessed: Vec<Record>,
    /// The capacity units consumed by the request
    pub consumed_capacity: Vec<ConsumedCapacity>,
}

impl WriteOutcome {
    /// Outcome with no capacity information
    pub fn new(accepted: usize, unprocessed: Vec<Record>) -> Self {
        Self {
            accepted,
            unprocessed,
            consumed_capacity: Vec::new(),
        }
    }

    /// Whether every submitted record was accepted
    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty()
    }

    fn merge(&mut self, other: WriteOutcome) {
        self.accepted += other.accepted;
        self.unprocessed.extend(other.unprocessed);
        self.consumed_capacity.extend(other.consumed_capacity);
    }
}

/// Batch write output containing metrics for one [`BatchWriter::write`] call
#[must_use = "batch write results carry metrics that should be reported"]
#[derive(Debug)]
pub struct BatchWriteOutput {
    /// Records acknowledged by the destination
    pub written: usize,
    /// Batch write requests issued, retries included
    pub requests: usize,
    /// Number of retry rounds (0 means no retries needed)
    pub retry_count: usize,
    /// Total execution time including all retries
    pub total_duration: Duration,
    /// The capacity units consumed by every request
    pub consumed_capacity: Vec<ConsumedCapacity>,
}

impl BatchWriteOutput {
    fn new() -> Self {
        Self {
            written: 0,
            requests: 0,
            retry_count: 0,
            total_duration: Duration::ZERO,
            consumed_capacity: Vec::new(),
        }
    }
}

/// Chunked, retrying writer into a [`DestinationTable`]
///
/// Records are split into chunks no larger than the destination's per-request
/// ceiling and written with bounded concurrency. Unprocessed records are
/// resubmitted with exponential backoff until accepted or the retry bound is hit,
/// in which case [`Error::WriteExhausted`] carries the records left over.
/// Chunks already written are never rolled back.
#[derive(Debug)]
pub struct BatchWriter<'a, D> {
    destination: &'a D,
    retries: RetryConfig,
    concurrency: usize,
}

impl<'a, D> BatchWriter<'a, D>
where
    D: DestinationTable,
{
    /// Writer with the default retry policy and concurrency
    pub fn new(destination: &'a D) -> Self {
        Self {
            destination,
            retries: RetryConfig::default(),
            concurrency: batch_processor::DEFAULT_CONCURRENCY,
        }
    }

    /// Override the retry policy
    pub fn with_retry_config(mut self, retries: RetryConfig) -> Self {
        self.retries = retries;
        self
    }

    /// Override the number of requests in flight; `1` writes chunks sequentially
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Write every record or fail
    ///
    /// # Automatic Retry Behavior
    ///
    /// Unprocessed records are retried up to `max_retries` times, waiting
    /// `initial_delay * 2^n` (capped at `max_delay`) before retry `n`.
    /// A request that fails outright is not retried here; it surfaces as
    /// [`Error::BatchWriteFailure`] after the SDK's own transport retries.
    pub async fn write(&self, records: Vec<Record>) -> Result<BatchWriteOutput, Error> {
        let start_time = Instant::now();
        let mut output = BatchWriteOutput::new();

        // Initial call
        let mut pending = self.write_round(records, &mut output).await?;

        // Retry loop for unprocessed records
        let mut retry_count = 0;

        while !pending.is_empty() && retry_count < self.retries.max_retries {
            let delay = retry_config::retry_delay(
                retry_count,
                self.retries.initial_delay,
                self.retries.max_delay,
            );

            debug!(
                table = self.destination.table_name(),
                unprocessed = pending.len(),
                attempt = retry_count + 1,
                delay_ms = delay.as_millis() as u64,
                "retrying unprocessed records"
            );

            sleep(delay).await;
            retry_count += 1;

            pending = self.write_round(pending, &mut output).await?;
        }

        output.retry_count = retry_count;
        output.total_duration = start_time.elapsed();

        if !pending.is_empty() {
            warn!(
                table = self.destination.table_name(),
                unprocessed = pending.len(),
                retries = retry_count,
                "records still unprocessed after all retries"
            );

            return Err(Error::WriteExhausted {
                table: self.destination.table_name().to_string(),
                unprocessed: pending,
                key_names: self.destination.key_attribute_names(),
            });
        }

        Ok(output)
    }

    /// One pass over `records`: chunk, send, and collect what came back unprocessed
    async fn write_round(
        &self,
        records: Vec<Record>,
        output: &mut BatchWriteOutput,
    ) -> Result<Vec<Record>, Error> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let batches = batch_processor::chunk(records, self.destination.max_batch_size());
        let concurrency = batches.len().min(self.concurrency).max(1);
        output.requests += batches.len();

        let round = stream::iter(
            batches
                .into_iter()
                .map(|batch| self.destination.write_batch(batch)),
        )
        .buffer_unordered(concurrency)
        .try_fold(WriteOutcome::default(), |mut acc, outcome| async move {
            acc.merge(outcome);
            Ok(acc)
        })
        .await?;

        output.written += round.accepted;
        output.consumed_capacity.extend(round.consumed_capacity);

        Ok(round.unprocessed)
    }
}
