use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_runtime::env_config::file::{EnvConfigFileKind, EnvConfigFiles};
use aws_types::sdk_config::{RetryConfig as SdkRetryConfig, TimeoutConfig};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::Error;
use crate::table::{
    DEFAULT_WRITE_CONCURRENCY, RangeFilter, RetryConfig, TIMESTAMP_ATTRIBUTE, TimeWindow,
};

/// Failure to load a copier configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read the configuration file '{path}': {source}")]
    Read {
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or misses a required key
    #[error("failed to parse the configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A window bound is not an ISO-8601 date-time
    #[error("invalid ISO-8601 timestamp for {field}: '{value}'")]
    InvalidTimestamp {
        /// Configuration key
        field: &'static str,
        /// Rejected value
        value: String,
    },
}

/// Copier settings, loaded from a TOML file
///
/// ```toml
/// source_table_name = "readings"
/// destination_table_name = "readings-backfill"
/// source_region_name = "us-east-1"
/// destination_endpoint_url = "http://127.0.0.1:4566"
/// start_time_iso8601 = "2024-01-01T00:00:00Z"
/// end_time_iso8601 = "2024-02-01T00:00:00Z"
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopierConfig {
    /// Shared credentials file handed to both clients
    pub aws_credentials_file_path: Option<PathBuf>,
    /// Named profile inside the credentials file
    pub aws_profile_name: Option<String>,
    /// Table to read from
    pub source_table_name: String,
    /// Table to write into; created from the source schema if missing
    pub destination_table_name: String,
    /// Region of the source table
    pub source_region_name: String,
    /// Region of the destination table, defaults to the source region
    pub destination_region_name: Option<String>,
    /// Custom endpoint for the source, e.g. LocalStack
    pub source_endpoint_url: Option<String>,
    /// Custom endpoint for the destination, e.g. LocalStack
    pub destination_endpoint_url: Option<String>,
    /// Inclusive start of the window
    pub start_time_iso8601: String,
    /// Exclusive end of the window
    pub end_time_iso8601: String,
    /// Numeric attribute holding milliseconds since epoch
    #[serde(default = "default_timestamp_attribute")]
    pub timestamp_attribute: String,
    /// Items evaluated per scan request; server default when unset
    pub scan_page_size: Option<i32>,
    /// Batch write requests in flight per page
    #[serde(default = "default_write_concurrency")]
    pub write_concurrency: usize,
    /// Backoff policy for unprocessed records
    #[serde(default)]
    pub retry: RetrySettings,
}

/// `[retry]` table of the configuration file
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Retry rounds after the initial attempt
    pub max_retries: usize,
    /// Delay before the first retry
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_retries: defaults.max_retries,
            initial_delay_ms: defaults.initial_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
        }
    }
}

fn default_timestamp_attribute() -> String {
    TIMESTAMP_ATTRIBUTE.to_string()
}

fn default_write_concurrency() -> usize {
    DEFAULT_WRITE_CONCURRENCY
}

impl CopierConfig {
    /// Read and parse a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// The `[start, end)` window to copy
    pub fn time_window(&self) -> Result<TimeWindow, Error> {
        let start = parse_timestamp("start_time_iso8601", &self.start_time_iso8601)?;
        let end = parse_timestamp("end_time_iso8601", &self.end_time_iso8601)?;
        TimeWindow::from_datetimes(&start, &end)
    }

    /// Scan predicate over the configured timestamp attribute
    pub fn range_filter(&self) -> Result<RangeFilter, Error> {
        Ok(RangeFilter::on_attribute(
            self.timestamp_attribute.clone(),
            self.time_window()?,
        ))
    }

    /// Backoff policy for the batch writer
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry.max_retries,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    /// SDK configuration for the source client
    pub async fn source_sdk_config(&self) -> SdkConfig {
        self.sdk_config(
            &self.source_region_name,
            self.source_endpoint_url.as_deref(),
        )
        .await
    }

    /// SDK configuration for the destination client
    pub async fn destination_sdk_config(&self) -> SdkConfig {
        let region = self
            .destination_region_name
            .as_deref()
            .unwrap_or(&self.source_region_name);
        self.sdk_config(region, self.destination_endpoint_url.as_deref())
            .await
    }

    /// Build an SDK configuration with explicit credentials and sensible defaults
    ///
    /// - Adaptive retry mode with 3 max attempts
    /// - Exponential backoff starting at 1 second
    /// - Connect timeout: 3 seconds
    /// - Read timeout: 20 seconds
    /// - Operation timeout: 60 seconds
    async fn sdk_config(&self, region: &str, endpoint_url: Option<&str>) -> SdkConfig {
        let timeout_config = TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(3))
            .read_timeout(Duration::from_secs(20))
            .operation_timeout(Duration::from_secs(60))
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .retry_config(
                SdkRetryConfig::adaptive()
                    .with_max_attempts(3)
                    .with_initial_backoff(Duration::from_secs(1)),
            )
            .timeout_config(timeout_config);

        if let Some(path) = &self.aws_credentials_file_path {
            let profile_files = EnvConfigFiles::builder()
                .with_file(EnvConfigFileKind::Credentials, path)
                .include_default_config_file(true)
                .build();
            loader = loader.profile_files(profile_files);
        }

        if let Some(profile) = &self.aws_profile_name {
            loader = loader.profile_name(profile);
        }

        if let Some(url) = endpoint_url {
            loader = loader.endpoint_url(url);
        }

        loader.load().await
    }
}

/// ISO-8601 forms carrying an offset, tried after RFC 3339
///
/// `%#z` takes `Z`, `+01`, `+0100` and `+01:00`.
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y%m%dT%H%M%S%.f%#z",
    "%Y%m%dT%H%M%#z",
];

/// ISO-8601 forms without an offset, taken as UTC
const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M",
];

/// Parse an ISO-8601 date-time
///
/// Accepts extended and basic formats, with or without seconds and fractions.
/// An offset may be `Z`, `+hh`, `+hhmm` or `+hh:mm`. Values without an offset
/// are taken as UTC, and a bare date as midnight UTC.
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, ConfigError> {
    let value = value.trim();

    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Ok(datetime.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(datetime) = DateTime::parse_from_str(value, format) {
            return Ok(datetime.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    for format in ["%Y-%m-%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(date.and_time(NaiveTime::default()).and_utc());
        }
    }

    Err(ConfigError::InvalidTimestamp {
        field,
        value: value.to_string(),
    })
}
