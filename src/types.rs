use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};

use crate::{FlipsideError, Record};

/// Lifecycle state of a query run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryRunState {
    Ready,
    Running,
    StreamingResults,
    Success,
    Failed,
    Canceled,
}

impl QueryRunState {
    /// Whether polling can stop.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Canceled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "QUERY_STATE_READY",
            Self::Running => "QUERY_STATE_RUNNING",
            Self::StreamingResults => "QUERY_STATE_STREAMING_RESULTS",
            Self::Success => "QUERY_STATE_SUCCESS",
            Self::Failed => "QUERY_STATE_FAILED",
            Self::Canceled => "QUERY_STATE_CANCELED",
        }
    }
}

impl FromStr for QueryRunState {
    type Err = FlipsideError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "QUERY_STATE_READY" => Ok(Self::Ready),
            "QUERY_STATE_RUNNING" => Ok(Self::Running),
            "QUERY_STATE_STREAMING_RESULTS" => Ok(Self::StreamingResults),
            "QUERY_STATE_SUCCESS" => Ok(Self::Success),
            "QUERY_STATE_FAILED" => Ok(Self::Failed),
            "QUERY_STATE_CANCELED" => Ok(Self::Canceled),
            other => Err(FlipsideError::Decode(format!(
                "unknown query run state '{other}'"
            ))),
        }
    }
}

impl fmt::Display for QueryRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryRun {
    pub id: String,
    pub state: QueryRunState,
    pub error_name: Option<String>,
    pub error_message: Option<String>,
    pub row_count: Option<u64>,
    pub total_size: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Identifies a finished query and the size of its result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryHandle {
    pub query_id: String,
    pub total_rows: u64,
}

impl QueryHandle {
    pub fn new(query_id: impl Into<String>, total_rows: u64) -> Self {
        Self {
            query_id: query_id.into(),
            total_rows,
        }
    }
}

/// One `(query, page, size)` fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub query_id: &'a str,
    /// 1-based.
    pub page_number: u64,
    pub page_size: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageStats {
    pub current_page_number: u64,
    pub current_page_size: u64,
    pub total_rows: u64,
    pub total_pages: u64,
}

/// Records of one result page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    pub columns: Vec<String>,
    pub column_types: Vec<String>,
    pub records: Vec<Record>,
    pub stats: PageStats,
}

/// A finished query run together with its first page of results.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResultSet {
    pub query_id: String,
    pub run: QueryRun,
    pub page: Page,
}

impl QueryResultSet {
    pub fn handle(&self) -> QueryHandle {
        QueryHandle::new(self.query_id.clone(), self.page.stats.total_rows)
    }

    pub fn total_rows(&self) -> u64 {
        self.page.stats.total_rows
    }
}
