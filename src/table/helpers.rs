/// Retry configuration for batch operations
pub(crate) mod retry_config {
    use std::time::Duration;

    /// Calculate retry delay with exponential backoff
    ///
    /// # Arguments
    /// * `attempt` - The retry attempt number (0-based)
    /// * `initial` - Initial delay duration
    /// * `max` - Maximum delay duration
    ///
    /// # Returns
    /// Duration to wait before retrying
    pub(crate) fn retry_delay(attempt: usize, initial: Duration, max: Duration) -> Duration {
        let factor = 2u64.checked_pow(attempt as u32).unwrap_or(u64::MAX);
        let delay_ms = (initial.as_millis() as u64).saturating_mul(factor);
        let capped_delay = delay_ms.min(max.as_millis() as u64);
        Duration::from_millis(capped_delay)
    }
}

/// Filter expression builder for range scans
pub(crate) mod expressions {
    use aws_sdk_dynamodb::types::AttributeValue;
    use std::collections::HashMap;

    use crate::table::RangeFilter;

    /// Placeholder for the filtered attribute; `timestamp` is a DynamoDB reserved word
    pub(crate) const ATTRIBUTE_PLACEHOLDER: &str = "#ts";
    pub(crate) const START_PLACEHOLDER: &str = ":start_ms";
    pub(crate) const END_PLACEHOLDER: &str = ":end_ms";

    /// A compiled filter expression ready to attach to a scan request
    #[derive(Debug)]
    pub(crate) struct FilterExpression {
        pub(crate) expression: String,
        pub(crate) names: HashMap<String, String>,
        pub(crate) values: HashMap<String, AttributeValue>,
    }

    /// Compile `attribute >= start AND attribute < end`
    pub(crate) fn range_filter(filter: &RangeFilter) -> FilterExpression {
        let expression = format!(
            "{ATTRIBUTE_PLACEHOLDER} >= {START_PLACEHOLDER} AND {ATTRIBUTE_PLACEHOLDER} < {END_PLACEHOLDER}"
        );

        let names = HashMap::from([(
            ATTRIBUTE_PLACEHOLDER.to_string(),
            filter.attribute.clone(),
        )]);

        let values = HashMap::from([
            (
                START_PLACEHOLDER.to_string(),
                AttributeValue::N(filter.window.start_ms().to_string()),
            ),
            (
                END_PLACEHOLDER.to_string(),
                AttributeValue::N(filter.window.end_ms().to_string()),
            ),
        ]);

        FilterExpression {
            expression,
            names,
            values,
        }
    }
}

/// Batch processing utilities
pub(crate) mod batch_processor {
    /// Maximum number of items in one DynamoDB `BatchWriteItem` request
    pub(crate) const BATCH_WRITE_SIZE: usize = 25;
    /// Default number of batch write requests in flight
    pub const DEFAULT_CONCURRENCY: usize = 10;

    /// Split items into owned chunks of at most `chunk_size`
    pub(crate) fn chunk<T>(items: Vec<T>, chunk_size: usize) -> Vec<Vec<T>> {
        let chunk_size = chunk_size.max(1);
        let mut batches = Vec::with_capacity(items.len().div_ceil(chunk_size));
        let mut items = items.into_iter().peekable();

        while items.peek().is_some() {
            batches.push(items.by_ref().take(chunk_size).collect());
        }

        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{RangeFilter, TimeWindow};
    use aws_sdk_dynamodb::types::AttributeValue;
    use std::time::Duration;

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let initial = Duration::from_millis(100);
        let max = Duration::from_millis(1000);

        assert_eq!(
            retry_config::retry_delay(0, initial, max),
            Duration::from_millis(100)
        );
        assert_eq!(
            retry_config::retry_delay(1, initial, max),
            Duration::from_millis(200)
        );
        assert_eq!(
            retry_config::retry_delay(3, initial, max),
            Duration::from_millis(800)
        );
        assert_eq!(retry_config::retry_delay(4, initial, max), max);
        assert_eq!(retry_config::retry_delay(200, initial, max), max);
    }

    #[test]
    fn test_range_filter_expression() {
        let filter = RangeFilter::new(TimeWindow::new(1_000, 2_000).unwrap());
        let compiled = expressions::range_filter(&filter);

        assert_eq!(compiled.expression, "#ts >= :start_ms AND #ts < :end_ms");
        assert_eq!(compiled.names.get("#ts"), Some(&"timestamp".to_string()));
        assert_eq!(
            compiled.values.get(":start_ms"),
            Some(&AttributeValue::N("1000".to_string()))
        );
        assert_eq!(
            compiled.values.get(":end_ms"),
            Some(&AttributeValue::N("2000".to_string()))
        );
    }

    #[test]
    fn test_range_filter_custom_attribute() {
        let filter = RangeFilter::on_attribute("created_at", TimeWindow::new(1, 2).unwrap());
        let compiled = expressions::range_filter(&filter);
        assert_eq!(compiled.names.get("#ts"), Some(&"created_at".to_string()));
    }

    #[test]
    fn test_chunk_respects_limit() {
        let items: Vec<usize> = (0..30).collect();
        let chunks = batch_processor::chunk(items, batch_processor::BATCH_WRITE_SIZE);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 25);
        assert_eq!(chunks[1].len(), 5);

        let exact = batch_processor::chunk((0..50).collect::<Vec<usize>>(), 25);
        assert!(exact.iter().all(|c| c.len() == 25));
        assert!(batch_processor::chunk::<usize>(Vec::new(), 25).is_empty());
        assert_eq!(batch_processor::chunk(vec![1, 2, 3], 0).len(), 3);
    }
}
