use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, TimeZone};
use serde_dynamo::from_attribute_value;
use std::{collections::HashMap, fmt, time::Duration};

use crate::Error;

/// A single item, copied verbatim from source to destination
pub type Record = HashMap<String, AttributeValue>;

/// Default name of the numeric attribute holding milliseconds since epoch
pub const TIMESTAMP_ATTRIBUTE: &str = "timestamp";

/// Read the timestamp attribute of a record as milliseconds since epoch
///
/// Returns `None` when the attribute is missing or not numeric.
pub fn record_timestamp(record: &Record, attribute: &str) -> Option<i64> {
    let value = record.get(attribute)?;
    let timestamp: Result<i64, _> = from_attribute_value(value.clone());
    timestamp.ok()
}

/// Render the primary key of a record, e.g. `{device_id=a1, timestamp=17}`
///
/// Falls back to every attribute name when no key names are known.
pub fn describe_key(record: &Record, key_names: &[String]) -> String {
    let mut names: Vec<&str> = if key_names.is_empty() {
        record.keys().map(String::as_str).collect()
    } else {
        key_names.iter().map(String::as_str).collect()
    };

    if key_names.is_empty() {
        names.sort_unstable();
    }

    let parts: Vec<String> = names
        .into_iter()
        .map(|name| match record.get(name) {
            Some(value) => format!("{name}={}", render_value(value)),
            None => format!("{name}=<missing>"),
        })
        .collect();

    format!("{{{}}}", parts.join(", "))
}

fn render_value(value: &AttributeValue) -> String {
    match value {
        AttributeValue::S(s) => s.clone(),
        AttributeValue::N(n) => n.clone(),
        AttributeValue::Bool(b) => b.to_string(),
        AttributeValue::B(blob) => format!("<{} bytes>", blob.as_ref().len()),
        other => format!("{other:?}"),
    }
}

/// Half-open range `[start_ms, end_ms)` of timestamps to copy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    start_ms: i64,
    end_ms: i64,
}

impl TimeWindow {
    /// Build a window from millisecond timestamps
    ///
    /// Inverted and zero-width windows are rejected with [`Error::InvalidTimeWindow`].
    pub fn new(start_ms: i64, end_ms: i64) -> Result<Self, Error> {
        if start_ms >= end_ms {
            return Err(Error::InvalidTimeWindow { start_ms, end_ms });
        }
        Ok(Self { start_ms, end_ms })
    }

    /// Build a window from two absolute date-times
    pub fn from_datetimes<Tz: TimeZone>(
        start: &DateTime<Tz>,
        end: &DateTime<Tz>,
    ) -> Result<Self, Error> {
        Self::new(start.timestamp_millis(), end.timestamp_millis())
    }

    /// Inclusive lower bound
    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    /// Exclusive upper bound
    pub fn end_ms(&self) -> i64 {
        self.end_ms
    }

    /// Whether `timestamp_ms` falls inside the window
    pub fn contains(&self, timestamp_ms: i64) -> bool {
        self.start_ms <= timestamp_ms && timestamp_ms < self.end_ms
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start_ms, self.end_ms)
    }
}

/// Server-side scan predicate: `attribute >= start AND attribute < end`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeFilter {
    /// Name of the numeric timestamp attribute
    pub attribute: String,
    /// Accepted range
    pub window: TimeWindow,
}

impl RangeFilter {
    /// Filter on the default `timestamp` attribute
    pub fn new(window: TimeWindow) -> Self {
        Self::on_attribute(TIMESTAMP_ATTRIBUTE, window)
    }

    /// Filter on a custom attribute
    pub fn on_attribute(attribute: impl Into<String>, window: TimeWindow) -> Self {
        Self {
            attribute: attribute.into(),
            window,
        }
    }

    /// Evaluate the predicate locally against a record
    pub fn matches(&self, record: &Record) -> bool {
        record_timestamp(record, &self.attribute).is_some_and(|ts| self.window.contains(ts))
    }
}

/// Opaque continuation token returned after a scan page
///
/// Wraps the `LastEvaluatedKey` of a DynamoDB scan.
#[must_use = "cursor should be used to fetch the next page"]
#[derive(Clone, Debug, PartialEq)]
pub struct PageCursor(Record);

impl PageCursor {
    /// Wrap an exclusive start key
    pub fn new(last_evaluated_key: Record) -> Self {
        Self(last_evaluated_key)
    }

    /// Unwrap into the exclusive start key for the next request
    pub fn into_inner(self) -> Record {
        self.0
    }
}

/// One scan response
#[must_use = "page results should be written or you'll lose the fetched data"]
#[derive(Clone, Debug, Default)]
pub struct Page {
    /// Records that matched the filter, in scan order
    pub records: Vec<Record>,
    /// Continuation token; `None` means the scan is exhausted
    pub cursor: Option<PageCursor>,
    /// Number of items the server evaluated before filtering
    pub scanned_count: usize,
}

impl Page {
    /// Whether the source reported more data to scan
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    /// Number of matching records in this page
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether this page carries no matching records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Retry configuration for batch writes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry rounds after the initial attempt
    pub max_retries: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on the delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(5000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn reading(id: &str, ts: i64) -> Record {
        HashMap::from([
            ("device_id".to_string(), AttributeValue::S(id.to_string())),
            ("timestamp".to_string(), AttributeValue::N(ts.to_string())),
        ])
    }

    #[test]
    fn test_window_is_half_open() {
        let window = TimeWindow::new(100, 200).unwrap();
        assert!(window.contains(100));
        assert!(window.contains(199));
        assert!(!window.contains(200));
        assert!(!window.contains(99));
    }

    #[test]
    fn test_window_rejects_inverted_and_empty() {
        assert!(matches!(
            TimeWindow::new(200, 100),
            Err(Error::InvalidTimeWindow {
                start_ms: 200,
                end_ms: 100
            })
        ));
        assert!(TimeWindow::new(100, 100).is_err());
    }

    #[test]
    fn test_window_from_datetimes() {
        let start = Utc.timestamp_millis_opt(1_000).unwrap();
        let end = Utc.timestamp_millis_opt(5_000).unwrap();
        let window = TimeWindow::from_datetimes(&start, &end).unwrap();
        assert_eq!(window.start_ms(), 1_000);
        assert_eq!(window.end_ms(), 5_000);
        assert_eq!(window.to_string(), "[1000, 5000)");
    }

    #[test]
    fn test_record_timestamp() {
        let record = reading("a", 1_700_000_000_000);
        assert_eq!(
            record_timestamp(&record, "timestamp"),
            Some(1_700_000_000_000)
        );
        assert_eq!(record_timestamp(&record, "created_at"), None);

        let mut textual = record.clone();
        let _ = textual.insert("timestamp".to_string(), AttributeValue::S("x".into()));
        assert_eq!(record_timestamp(&textual, "timestamp"), None);
    }

    #[test]
    fn test_range_filter_matches() {
        let filter = RangeFilter::new(TimeWindow::new(10, 20).unwrap());
        assert!(filter.matches(&reading("a", 10)));
        assert!(!filter.matches(&reading("a", 20)));
        assert!(!filter.matches(&HashMap::new()));
    }

    #[test]
    fn test_describe_key() {
        let record = reading("sensor-1", 42);
        let keys = vec!["device_id".to_string(), "timestamp".to_string()];
        assert_eq!(
            describe_key(&record, &keys),
            "{device_id=sensor-1, timestamp=42}"
        );
        assert_eq!(
            describe_key(&record, &["missing".to_string()]),
            "{missing=<missing>}"
        );
        assert_eq!(
            describe_key(&record, &[]),
            "{device_id=sensor-1, timestamp=42}"
        );
    }

    #[test]
    fn test_page_cursor_presence() {
        let page = Page::default();
        assert!(!page.has_more());
        assert!(page.is_empty());

        let page = Page {
            records: Vec::new(),
            cursor: Some(PageCursor::new(reading("a", 1))),
            scanned_count: 100,
        };
        assert!(page.has_more());
        assert_eq!(page.len(), 0);
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.initial_delay, Duration::from_millis(100));
    }
}
