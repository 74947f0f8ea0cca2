/// Configures HTTP timeout and retry behavior.
///
/// Retries are off by default: a failed request surfaces immediately.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Base retry backoff in milliseconds (exponential strategy).
    pub retry_backoff_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            max_retries: 0,
            retry_backoff_ms: 250,
        }
    }
}

/// Controls how a query run is created, awaited and first read.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueryOptions {
    /// How long the service keeps the results, in minutes.
    pub ttl_minutes: u64,
    /// Maximum age of a cached result that may be reused, in minutes.
    pub max_age_minutes: u64,
    /// When false, a fresh run is forced regardless of `max_age_minutes`.
    pub cached: bool,
    /// Deadline for the run to reach a terminal state.
    pub timeout_minutes: u64,
    /// Delay between status polls.
    pub retry_interval_seconds: u64,
    /// First page returned with the result set.
    pub page_number: u64,
    pub page_size: u64,
    pub data_source: String,
    pub data_provider: String,
}

impl QueryOptions {
    /// Result TTL rounded up to whole hours, as the API expects.
    pub(crate) fn result_ttl_hours(&self) -> u64 {
        self.ttl_minutes.div_ceil(60).max(1)
    }

    pub(crate) fn effective_max_age_minutes(&self) -> u64 {
        if self.cached {
            self.max_age_minutes
        } else {
            0
        }
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            ttl_minutes: 60,
            max_age_minutes: 0,
            cached: true,
            timeout_minutes: 20,
            retry_interval_seconds: 1,
            page_number: 1,
            page_size: 100_000,
            data_source: "snowflake-default".to_owned(),
            data_provider: "flipside".to_owned(),
        }
    }
}
