use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::CopierConfig;
use crate::error::Error;
use crate::table::{
    BatchWriter, DEFAULT_WRITE_CONCURRENCY, DestinationTable, RangeFilter, RangeScanner,
    RetryConfig, SourceTable,
};

/// Tuning knobs for a copy run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyOptions {
    /// Backoff policy for unprocessed records
    pub retry: RetryConfig,
    /// Batch write requests in flight per page
    pub write_concurrency: usize,
    /// Items evaluated per scan request
    pub scan_page_size: Option<i32>,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            write_concurrency: DEFAULT_WRITE_CONCURRENCY,
            scan_page_size: None,
        }
    }
}

impl CopyOptions {
    /// Options taken from a loaded configuration
    pub fn from_config(config: &CopierConfig) -> Self {
        Self {
            retry: config.retry_config(),
            write_concurrency: config.write_concurrency,
            scan_page_size: config.scan_page_size,
        }
    }
}

/// Totals of a successful run
#[must_use = "the summary reports how many records were copied"]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CopySummary {
    /// Scan requests issued
    pub pages: usize,
    /// Items the source evaluated, before filtering
    pub scanned: usize,
    /// Records written to the destination
    pub copied: usize,
    /// Retry rounds spent on unprocessed records
    pub retries: usize,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

/// Scan-then-write pipeline between two tables
///
/// Pages are handled strictly one after another: the next scan request is only
/// issued once the current page is fully written, so at most one page of
/// records is held in memory.
#[derive(Debug)]
pub struct TableCopier<'a, S, D> {
    source: &'a S,
    destination: &'a D,
    options: CopyOptions,
}

impl<'a, S, D> TableCopier<'a, S, D>
where
    S: SourceTable,
    D: DestinationTable,
{
    /// Copier between `source` and `destination`
    pub fn new(source: &'a S, destination: &'a D, options: CopyOptions) -> Self {
        Self {
            source,
            destination,
            options,
        }
    }

    /// Copy every source record matching `filter`
    ///
    /// Any scan or write error aborts the run. Records written by earlier pages
    /// stay in the destination; rerunning the same window is safe because
    /// writes overwrite by primary key.
    pub async fn run(&self, filter: RangeFilter) -> Result<CopySummary, Error> {
        let source = self.source.table_name();
        let destination = self.destination.table_name();

        info!(
            source,
            destination,
            attribute = %filter.attribute,
            window = %filter.window,
            "starting table copy"
        );

        let start_time = Instant::now();
        let mut summary = CopySummary::default();

        let mut scanner =
            RangeScanner::new(self.source, filter).with_page_size(self.options.scan_page_size);
        let writer = BatchWriter::new(self.destination)
            .with_retry_config(self.options.retry.clone())
            .with_concurrency(self.options.write_concurrency);

        loop {
            let page = match scanner.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) => return Err(self.abort(e, &summary)),
            };

            summary.pages += 1;
            summary.scanned += page.scanned_count;
            let has_more = page.has_more();

            if !page.is_empty() {
                let page_size = page.len();
                let output = match writer.write(page.records).await {
                    Ok(output) => output,
                    Err(e) => return Err(self.abort(e, &summary)),
                };

                summary.copied += page_size;
                summary.retries += output.retry_count;

                info!(
                    copied = summary.copied,
                    new = page_size,
                    requests = output.requests,
                    retries = output.retry_count,
                    "batch completed: copied {} ({} new) items from {} to {}",
                    summary.copied,
                    page_size,
                    source,
                    destination
                );
            }

            if !has_more {
                break;
            }
        }

        summary.duration = start_time.elapsed();

        info!(
            pages = summary.pages,
            scanned = summary.scanned,
            copied = summary.copied,
            duration_ms = summary.duration.as_millis() as u64,
            "copy complete"
        );

        Ok(summary)
    }

    /// Log progress reached before `error`; the caller reports the error itself
    fn abort(&self, error: Error, summary: &CopySummary) -> Error {
        warn!(
            source = self.source.table_name(),
            destination = self.destination.table_name(),
            pages = summary.pages,
            copied = summary.copied,
            "copy aborted after {} records; rerun the same window to resume",
            summary.copied
        );
        error
    }
}
