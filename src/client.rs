use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::{header, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::time::{sleep, Instant};

use crate::{
    decode::{decode_page, decode_query_run},
    paginate::PageSource,
    wire::{self, RpcRequest, RpcResponse},
    ClientOptions, FlipsideError, Page, PageRequest, QueryOptions, QueryResultSet, QueryRun,
    QueryRunState, Record, Result,
};

/// Public Flipside API host.
pub const DEFAULT_API_URL: &str = "https://api-v2.flipsidecrypto.xyz";

/// Row layout requested from `getQueryRunResults`: each row is an array
/// aligned with `columnNames`.
const RESULT_FORMAT: &str = "csv";

/// Formats an API base URL into the JSON-RPC endpoint URL.
///
/// Example: `"https://api-v2.flipsidecrypto.xyz/"` → `"https://api-v2.flipsidecrypto.xyz/json-rpc"`
pub fn base_url_to_rpc_url(base_url: &str) -> String {
    format!("{}/json-rpc", base_url.trim().trim_end_matches('/'))
}

#[derive(Clone)]
/// HTTP client for the Flipside JSON-RPC query API.
///
/// The client is an explicit handle: build one per API key and pass it to
/// whatever submits queries or paginates results.
pub struct FlipsideClient {
    http: reqwest::Client,
    rpc_url: String,
    api_key: String,
    options: ClientOptions,
}

impl fmt::Debug for FlipsideClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlipsideClient")
            .field("rpc_url", &self.rpc_url)
            .field("api_key", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

impl FlipsideClient {
    /// Creates a client for the public API host.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_API_URL, api_key)
    }

    /// Creates a client for another API host, e.g. a local mock.
    pub fn with_base_url(base_url: impl AsRef<str>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            rpc_url: base_url_to_rpc_url(base_url.as_ref()),
            api_key: api_key.into(),
            options: ClientOptions::default(),
        }
    }

    /// Applies client options such as timeout and retry behavior.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Runs `sql` with default [`QueryOptions`] and returns the first page.
    pub async fn query(&self, sql: &str) -> Result<QueryResultSet> {
        self.query_with(sql, &QueryOptions::default()).await
    }

    /// Submits `sql`, waits for the run to finish and fetches the page
    /// selected by `opts.page_number` / `opts.page_size`.
    ///
    /// A failed or canceled run, or one still running after
    /// `opts.timeout_minutes`, is returned as an error.
    pub async fn query_with(&self, sql: &str, opts: &QueryOptions) -> Result<QueryResultSet> {
        let run = self.create_query_run(sql, opts).await?;

        #[cfg(feature = "tracing")]
        tracing::info!(query_run_id = %run.id, state = %run.state, "query run created");

        let run = self.wait_for_completion(run, opts).await?;
        let page = self
            .get_query_results(&run.id, opts.page_number, opts.page_size)
            .await?;

        Ok(QueryResultSet {
            query_id: run.id.clone(),
            run,
            page,
        })
    }

    /// Starts a query run (`createQueryRun`).
    pub async fn create_query_run(&self, sql: &str, opts: &QueryOptions) -> Result<QueryRun> {
        let tags = BTreeMap::from([
            ("sdk_package", env!("CARGO_PKG_NAME")),
            ("sdk_version", env!("CARGO_PKG_VERSION")),
            ("sdk_language", "rust"),
        ]);
        let params = wire::CreateQueryRunParams {
            result_ttl_hours: opts.result_ttl_hours(),
            max_age_minutes: opts.effective_max_age_minutes(),
            sql,
            tags,
            data_source: &opts.data_source,
            data_provider: &opts.data_provider,
        };
        let result: wire::CreateQueryRunResult = self.call(wire::CREATE_QUERY_RUN, params).await?;
        decode_query_run(result.query_run)
    }

    /// Reads the current status of a query run (`getQueryRun`).
    ///
    /// When the service answers with `redirectedToQueryRun` (e.g. a cached
    /// run serving the same SQL), that run is returned instead.
    pub async fn get_query_run(&self, query_run_id: &str) -> Result<QueryRun> {
        let params = wire::QueryRunIdParams { query_run_id };
        let result: wire::GetQueryRunResult = self.call(wire::GET_QUERY_RUN, params).await?;
        let run = result.redirected_to_query_run.unwrap_or(result.query_run);
        decode_query_run(run)
    }

    /// Fetches one page of a finished run (`getQueryRunResults`).
    ///
    /// `page_number` is 1-based; both arguments must be positive.
    pub async fn get_query_results(
        &self,
        query_run_id: &str,
        page_number: u64,
        page_size: u64,
    ) -> Result<Page> {
        if page_number == 0 || page_size == 0 {
            return Err(FlipsideError::InvalidArgument(format!(
                "page number and size must be positive, got page {page_number} size {page_size}"
            )));
        }

        let params = wire::GetQueryRunResultsParams {
            query_run_id,
            format: RESULT_FORMAT,
            page: wire::PageParams {
                number: page_number,
                size: page_size,
            },
        };
        let result: wire::GetQueryRunResultsResult =
            self.call(wire::GET_QUERY_RUN_RESULTS, params).await?;
        decode_page(result)
    }

    /// Cancels a query run (`cancelQueryRun`).
    pub async fn cancel_query_run(&self, query_run_id: &str) -> Result<QueryRun> {
        let params = wire::QueryRunIdParams { query_run_id };
        let result: wire::CancelQueryRunResult = self.call(wire::CANCEL_QUERY_RUN, params).await?;
        decode_query_run(result.canceled_query_run)
    }

    async fn wait_for_completion(
        &self,
        mut run: QueryRun,
        opts: &QueryOptions,
    ) -> Result<QueryRun> {
        let timeout = Duration::from_secs(opts.timeout_minutes.saturating_mul(60));
        let deadline = Instant::now().checked_add(timeout);
        let interval = Duration::from_secs(opts.retry_interval_seconds);

        while !run.state.is_terminal() {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(FlipsideError::QueryRunTimeout {
                    query_run_id: run.id,
                    minutes: opts.timeout_minutes,
                });
            }

            sleep(interval).await;
            run = self.get_query_run(&run.id).await?;

            #[cfg(feature = "tracing")]
            tracing::debug!(query_run_id = %run.id, state = %run.state, "polled query run");
        }

        match run.state {
            QueryRunState::Failed => Err(FlipsideError::QueryRunFailed {
                query_run_id: run.id,
                name: run.error_name,
                message: run.error_message,
            }),
            QueryRunState::Canceled => Err(FlipsideError::QueryRunCanceled {
                query_run_id: run.id,
            }),
            _ => Ok(run),
        }
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let payload = RpcRequest {
            jsonrpc: wire::JSON_RPC_VERSION,
            method,
            params: [params],
            id: 1,
        };
        let body = self.send_with_retry(&payload).await?;

        let response = serde_json::from_str::<RpcResponse<R>>(&body).map_err(|err| {
            FlipsideError::Decode(format!(
                "invalid {method} response JSON: {err}; body: {body}"
            ))
        })?;

        if let Some(error) = response.error {
            return Err(FlipsideError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| FlipsideError::Decode(format!("missing result for {method}")))
    }

    async fn send_with_retry<T: Serialize>(&self, payload: &T) -> Result<String> {
        let mut attempt = 0usize;
        loop {
            let response = self
                .http
                .post(&self.rpc_url)
                .header("x-api-key", &self.api_key)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::ACCEPT, "application/json")
                .timeout(Duration::from_millis(self.options.timeout_ms))
                .json(payload)
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.map_err(FlipsideError::Transport)?;

                    if !status.is_success() {
                        if self.should_retry_status(status) && attempt < self.options.max_retries {
                            self.wait_before_retry(attempt).await;
                            attempt += 1;
                            continue;
                        }

                        return Err(FlipsideError::Http {
                            status: status.as_u16(),
                            body,
                        });
                    }

                    return Ok(body);
                }
                Err(err) => {
                    if self.should_retry_transport(&err) && attempt < self.options.max_retries {
                        self.wait_before_retry(attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(FlipsideError::Transport(err));
                }
            }
        }
    }

    fn should_retry_status(&self, status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::INTERNAL_SERVER_ERROR
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
        )
    }

    fn should_retry_transport(&self, err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
    }

    /// Exponential backoff before the next attempt.
    async fn wait_before_retry(&self, attempt: usize) {
        let exp = attempt.min(16) as u32;
        let multiplier = 1u64 << exp;
        let delay_ms = self.options.retry_backoff_ms.saturating_mul(multiplier);

        #[cfg(feature = "tracing")]
        tracing::debug!("retrying rpc request after {} ms", delay_ms);

        sleep(Duration::from_millis(delay_ms)).await;
    }
}

impl PageSource for FlipsideClient {
    async fn fetch_page(&self, request: PageRequest<'_>) -> Result<Vec<Record>> {
        let page = self
            .get_query_results(request.query_id, request.page_number, request.page_size)
            .await?;
        Ok(page.records)
    }
}

#[cfg(test)]
mod tests {
    use super::{base_url_to_rpc_url, FlipsideClient};

    #[test]
    fn rpc_url_appends_endpoint_once() {
        assert_eq!(
            base_url_to_rpc_url("https://api-v2.flipsidecrypto.xyz/"),
            "https://api-v2.flipsidecrypto.xyz/json-rpc"
        );
        assert_eq!(
            FlipsideClient::new("key").rpc_url(),
            "https://api-v2.flipsidecrypto.xyz/json-rpc"
        );
    }

    #[test]
    fn debug_redacts_api_key() {
        let client = FlipsideClient::with_base_url("http://localhost", "secret-key");
        let debug = format!("{client:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-key"));
    }
}
