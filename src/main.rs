use anyhow::Context;
use flipside_candles::{
    paginate, read_api_key, CandleChart, CandleSeries, FlipsideClient, DEFAULT_API_KEY_PATH,
    DEFAULT_CHART_PATH, DEFAULT_PAGE_SIZE,
};
use tracing_subscriber::EnvFilter;

/// Hourly ETH/USD VWAP candles over the last 30 days.
const ETH_VWAP_HOURLY_SQL: &str = include_str!("sql/eth_vwap_hourly.sql");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let api_key = read_api_key(DEFAULT_API_KEY_PATH)?;
    let client = FlipsideClient::new(api_key);

    let result_set = client
        .query(ETH_VWAP_HOURLY_SQL)
        .await
        .context("query submission failed")?;
    let handle = result_set.handle();
    tracing::info!(
        query_id = %handle.query_id,
        total_rows = handle.total_rows,
        "query finished"
    );

    let records = paginate(&client, &handle, DEFAULT_PAGE_SIZE)
        .await
        .with_context(|| {
            format!(
                "fetching results with page size {DEFAULT_PAGE_SIZE} failed; \
                 rerun with a smaller page size"
            )
        })?;

    let series = CandleSeries::from_records(&records)?;
    CandleChart::default().write_html(&series, DEFAULT_CHART_PATH)?;
    tracing::info!(
        path = DEFAULT_CHART_PATH,
        candles = series.len(),
        "candlestick chart written"
    );

    Ok(())
}
