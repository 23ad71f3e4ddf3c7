use futures_util::stream::{self, Stream};
use tracing::debug;

use crate::Error;
use crate::table::operations::SourceTable;
use crate::table::types::{Page, PageCursor, RangeFilter};

/// Where the scan stands between two requests
#[derive(Debug)]
enum ScanState {
    /// No request issued yet
    Start,
    /// The previous page returned this cursor
    Scanning(PageCursor),
    /// The previous page had no cursor, or a request failed
    Done,
}

/// Paginated, filtered scan over a [`SourceTable`]
///
/// Each [`next_page`](Self::next_page) issues exactly one scan request. The first
/// request is always sent, and scanning continues for as long as the source
/// returns a cursor, even when a page came back with no matching records.
/// Once exhausted the scanner cannot be restarted.
#[derive(Debug)]
pub struct RangeScanner<'a, S> {
    source: &'a S,
    filter: RangeFilter,
    page_size: Option<i32>,
    state: ScanState,
}

impl<'a, S> RangeScanner<'a, S>
where
    S: SourceTable,
{
    /// Scanner positioned before the first page
    pub fn new(source: &'a S, filter: RangeFilter) -> Self {
        Self {
            source,
            filter,
            page_size: None,
            state: ScanState::Start,
        }
    }

    /// Cap the number of items evaluated per request
    pub fn with_page_size(mut self, page_size: Option<i32>) -> Self {
        self.page_size = page_size.filter(|size| *size > 0);
        self
    }

    /// The predicate sent with every request
    pub fn filter(&self) -> &RangeFilter {
        &self.filter
    }

    /// Whether the source has reported the end of the scan
    pub fn is_done(&self) -> bool {
        matches!(self.state, ScanState::Done)
    }

    /// Fetch the next page
    ///
    /// Returns `Ok(None)` once a previous page came back without a cursor.
    /// A failed request is returned as is and ends the scan; it is not retried.
    pub async fn next_page(&mut self) -> Result<Option<Page>, Error> {
        let cursor = match std::mem::replace(&mut self.state, ScanState::Done) {
            ScanState::Start => None,
            ScanState::Scanning(cursor) => Some(cursor),
            ScanState::Done => return Ok(None),
        };

        let page = self
            .source
            .scan_page(&self.filter, cursor, self.page_size)
            .await?;

        debug!(
            table = self.source.table_name(),
            matched = page.len(),
            scanned = page.scanned_count,
            has_more = page.has_more(),
            "scanned page"
        );

        if let Some(cursor) = &page.cursor {
            self.state = ScanState::Scanning(cursor.clone());
        }

        Ok(Some(page))
    }

    /// Adapt the scanner into a stream of pages
    pub fn pages(self) -> impl Stream<Item = Result<Page, Error>> + 'a
    where
        S: 'a,
    {
        stream::try_unfold(self, |mut scanner| async move {
            let page = scanner.next_page().await?;
            Ok(page.map(|page| (page, scanner)))
        })
    }
}
