//! `flipside-candles` is an async client for the Flipside query API.
//!
//! The crate wraps the `/json-rpc` endpoint and the steps around it:
//! - [`read_api_key`] loads the key from a local file
//! - [`FlipsideClient::query`] submits SQL and waits for the run
//! - [`paginate`] collects every result page in order
//! - [`CandleChart`] renders candles to a standalone HTML chart

mod chart;
mod client;
mod credentials;
mod decode;
mod error;
mod options;
mod paginate;
mod record;
mod types;
mod value;
mod wire;

pub use chart::{Candle, CandleChart, CandleColumns, CandleSeries, DEFAULT_CHART_PATH};
pub use client::{base_url_to_rpc_url, FlipsideClient, DEFAULT_API_URL};
pub use credentials::{read_api_key, DEFAULT_API_KEY_PATH};
pub use error::FlipsideError;
pub use options::{ClientOptions, QueryOptions};
pub use paginate::{page_count, paginate, PageSource, DEFAULT_PAGE_SIZE};
pub use record::Record;
pub use types::{
    Page, PageRequest, PageStats, QueryHandle, QueryResultSet, QueryRun, QueryRunState,
};
pub use value::{parse_timestamp, Value};

pub type Result<T> = std::result::Result<T, FlipsideError>;
