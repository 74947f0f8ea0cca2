//! Candlestick chart export.
//!
//! Records are reduced to a [`CandleSeries`] and rendered as a standalone
//! plotly HTML document.

use std::{fs, path::Path};

use chrono::{DateTime, Utc};
use plotly::{
    common::Title,
    layout::{Axis, RangeSlider},
    Candlestick, Layout, Plot,
};

use crate::{FlipsideError, Record, Result};

/// File written by the bundled script.
pub const DEFAULT_CHART_PATH: &str = "candlestick_chart.html";

/// Timestamp layout plotly reads as a date axis.
const PLOTLY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One open/high/low/close bucket.
#[derive(Clone, Debug, PartialEq)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Column names holding the candle fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandleColumns {
    pub time: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
}

impl Default for CandleColumns {
    fn default() -> Self {
        Self {
            time: "hour_".to_owned(),
            open: "open".to_owned(),
            high: "high".to_owned(),
            low: "low".to_owned(),
            close: "close".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Reads candles from `hour_`, `open`, `high`, `low` and `close`.
    pub fn from_records(records: &[Record]) -> Result<Self> {
        Self::from_records_with(records, &CandleColumns::default())
    }

    /// Reads candles using custom column names. Row order is kept.
    pub fn from_records_with(records: &[Record], columns: &CandleColumns) -> Result<Self> {
        let candles = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let time = record.get_timestamp(&columns.time).ok_or_else(|| {
                    FlipsideError::Decode(format!(
                        "row {index}: column '{}' is missing or not a timestamp",
                        columns.time
                    ))
                })?;
                Ok(Candle {
                    time,
                    open: price(record, &columns.open, index)?,
                    high: price(record, &columns.high, index)?,
                    low: price(record, &columns.low, index)?,
                    close: price(record, &columns.close, index)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { candles })
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

impl From<Vec<Candle>> for CandleSeries {
    fn from(candles: Vec<Candle>) -> Self {
        Self { candles }
    }
}

fn price(record: &Record, column: &str, index: usize) -> Result<f64> {
    record.get_f64(column).ok_or_else(|| {
        FlipsideError::Decode(format!(
            "row {index}: column '{column}' is missing or not numeric"
        ))
    })
}

/// Chart labels and layout switches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandleChart {
    pub title: String,
    pub x_axis_title: String,
    pub y_axis_title: String,
    pub range_slider: bool,
}

impl Default for CandleChart {
    fn default() -> Self {
        Self {
            title: "Candlestick Chart".to_owned(),
            x_axis_title: "Date and Time".to_owned(),
            y_axis_title: "Price".to_owned(),
            range_slider: true,
        }
    }
}

impl CandleChart {
    pub fn plot(&self, series: &CandleSeries) -> Plot {
        let candles = series.candles();
        let x = candles
            .iter()
            .map(|candle| candle.time.format(PLOTLY_DATE_FORMAT).to_string())
            .collect::<Vec<_>>();
        let open = candles.iter().map(|c| c.open).collect::<Vec<_>>();
        let high = candles.iter().map(|c| c.high).collect::<Vec<_>>();
        let low = candles.iter().map(|c| c.low).collect::<Vec<_>>();
        let close = candles.iter().map(|c| c.close).collect::<Vec<_>>();

        let trace = Candlestick::new(x, open, high, low, close);

        let layout = Layout::new()
            .title(Title::with_text(&self.title))
            .x_axis(
                Axis::new()
                    .title(Title::with_text(&self.x_axis_title))
                    .range_slider(RangeSlider::new().visible(self.range_slider)),
            )
            .y_axis(Axis::new().title(Title::with_text(&self.y_axis_title)));

        let mut plot = Plot::new();
        plot.add_trace(trace);
        plot.set_layout(layout);
        plot
    }

    /// Renders a complete HTML document.
    pub fn to_html(&self, series: &CandleSeries) -> String {
        self.plot(series).to_html()
    }

    /// Writes the HTML document to `path`, replacing any existing file.
    pub fn write_html(&self, series: &CandleSeries, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_html(series))?;
        Ok(())
    }
}
