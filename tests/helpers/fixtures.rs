//! Common test fixtures and data structures
//!
//! Defines the sensor reading model used across the test files.
use super::{Deserialize, Serialize};
use aws_sdk_dynamodb::types::AttributeValue;
use dynamo_table_copier::table::Record;
use serde_dynamo::to_item;
use std::collections::HashMap;

/// Partition key of the readings table
pub const PARTITION_KEY: &str = "device_id";

/// Sort key of the readings table
pub const SORT_KEY: &str = "timestamp";

/// Sensor reading keyed by device and timestamp
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Reading {
    pub device_id: String,
    pub timestamp: i64,
    pub celsius: f64,
    pub tags: Vec<String>,
}

impl Reading {
    pub fn new(device_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            celsius: 21.5,
            tags: vec!["backfill".to_string()],
        }
    }

    /// Serialize into a DynamoDB item
    pub fn record(&self) -> Record {
        to_item::<_, HashMap<String, AttributeValue>>(self).unwrap()
    }
}

/// Primary key names of the readings table
pub fn key_names() -> Vec<String> {
    vec![PARTITION_KEY.to_string(), SORT_KEY.to_string()]
}

/// `count` readings for one device, one second apart starting at `start_ms`
pub fn readings(device_id: &str, start_ms: i64, count: usize) -> Vec<Reading> {
    (0..count)
        .map(|i| Reading::new(device_id, start_ms + i as i64 * 1_000))
        .collect()
}
