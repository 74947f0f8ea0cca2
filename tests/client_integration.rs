use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use flipside_candles::{
    paginate, CandleChart, CandleSeries, ClientOptions, FlipsideClient, FlipsideError,
    QueryOptions, QueryRunState, Value,
};
use serde_json::{json, Value as JsonValue};

#[derive(Clone)]
struct MockResponse {
    status: StatusCode,
    body: JsonValue,
    delay: Duration,
}

impl MockResponse {
    fn json(status: StatusCode, body: JsonValue) -> Self {
        Self {
            status,
            body,
            delay: Duration::from_millis(0),
        }
    }

    fn result(result: JsonValue) -> Self {
        Self::json(
            StatusCode::OK,
            json!({ "jsonrpc": "2.0", "id": 1, "result": result }),
        )
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// One JSON-RPC call as seen by the mock server.
#[derive(Clone, Debug)]
struct RecordedCall {
    api_key: Option<String>,
    method: String,
    params: JsonValue,
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

async fn rpc_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> impl IntoResponse {
    state
        .calls
        .lock()
        .expect("call log mutex must not be poisoned")
        .push(RecordedCall {
            api_key: headers
                .get("x-api-key")
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned),
            method: body["method"].as_str().unwrap_or_default().to_owned(),
            params: body["params"][0].clone(),
        });

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "no mock response available"}),
            )
        })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    (response.status, Json(response.body))
}

struct TestServer {
    base_url: String,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn client(&self) -> FlipsideClient {
        FlipsideClient::with_base_url(&self.base_url, "test-key")
    }

    fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .expect("call log mutex must not be poisoned")
            .clone()
    }

    fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.method).collect()
    }
}

async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        calls: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/json-rpc", post(rpc_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        calls: state.calls,
        task,
    }
}

fn query_run(id: &str, state: &str) -> JsonValue {
    json!({
        "id": id,
        "state": state,
        "createdAt": "2024-05-01T12:59:58.000Z",
        "rowCount": null
    })
}

fn failed_run(id: &str) -> JsonValue {
    json!({
        "id": id,
        "state": "QUERY_STATE_FAILED",
        "errorName": "QueryRunExecutionError",
        "errorMessage": "SQL compilation error: Object 'NOPE' does not exist"
    })
}

fn candle_rows(page: u64, rows: u64, total_rows: u64, page_size: u64) -> JsonValue {
    let start = (page - 1) * page_size;
    let rows: Vec<JsonValue> = (start..start + rows)
        .map(|hour| {
            let open = 3000.0 + hour as f64;
            json!([
                format!("2024-05-01T{:02}:00:00.000Z", hour % 24),
                open,
                open - 5.0,
                open + 5.0,
                open + 1.0
            ])
        })
        .collect();

    json!({
        "columnNames": ["hour_", "open", "low", "high", "close"],
        "columnTypes": ["timestamp_ntz", "number", "number", "number", "number"],
        "rows": rows,
        "page": {
            "currentPageNumber": page,
            "currentPageSize": page_size,
            "totalRows": total_rows,
            "totalPages": total_rows.div_ceil(page_size)
        }
    })
}

fn fast_poll() -> QueryOptions {
    QueryOptions {
        retry_interval_seconds: 0,
        ..QueryOptions::default()
    }
}

#[tokio::test]
async fn query_polls_until_success_then_fetches_first_page() {
    let server = spawn_server(vec![
        MockResponse::result(json!({ "queryRun": query_run("qr-1", "QUERY_STATE_READY") })),
        MockResponse::result(json!({ "queryRun": query_run("qr-1", "QUERY_STATE_RUNNING") })),
        MockResponse::result(json!({ "queryRun": query_run("qr-1", "QUERY_STATE_SUCCESS") })),
        MockResponse::result(candle_rows(1, 3, 3, 100_000)),
    ])
    .await;

    let result = server
        .client()
        .query_with("SELECT 1", &fast_poll())
        .await
        .expect("query must succeed");

    assert_eq!(result.query_id, "qr-1");
    assert_eq!(result.run.state, QueryRunState::Success);
    assert_eq!(result.handle().total_rows, 3);
    assert_eq!(result.page.records.len(), 3);
    assert_eq!(result.page.records[0].get_f64("open"), Some(3000.0));
    assert!(matches!(
        result.page.records[0].get("hour_"),
        Some(Value::Timestamp(_))
    ));

    assert_eq!(
        server.methods(),
        vec![
            "createQueryRun",
            "getQueryRun",
            "getQueryRun",
            "getQueryRunResults"
        ]
    );
}

#[tokio::test]
async fn create_query_run_sends_sql_and_cache_settings() {
    let server = spawn_server(vec![MockResponse::result(
        json!({ "queryRun": query_run("qr-2", "QUERY_STATE_READY") }),
    )])
    .await;

    let opts = QueryOptions {
        ttl_minutes: 90,
        max_age_minutes: 30,
        cached: false,
        ..QueryOptions::default()
    };
    let run = server
        .client()
        .create_query_run("SELECT 42", &opts)
        .await
        .expect("create must succeed");
    assert_eq!(run.state, QueryRunState::Ready);

    let calls = server.calls();
    assert_eq!(calls[0].api_key.as_deref(), Some("test-key"));
    let params = &calls[0].params;
    assert_eq!(params["sql"], "SELECT 42");
    assert_eq!(params["resultTTLHours"], 2);
    assert_eq!(params["maxAgeMinutes"], 0);
    assert_eq!(params["dataSource"], "snowflake-default");
    assert_eq!(params["dataProvider"], "flipside");
}

#[tokio::test]
async fn failed_run_surfaces_upstream_error() {
    let server = spawn_server(vec![
        MockResponse::result(json!({ "queryRun": query_run("qr-3", "QUERY_STATE_RUNNING") })),
        MockResponse::result(json!({ "queryRun": failed_run("qr-3") })),
    ])
    .await;

    let err = server
        .client()
        .query_with("SELECT * FROM nope", &fast_poll())
        .await
        .expect_err("query must fail");

    match err {
        FlipsideError::QueryRunFailed {
            query_run_id,
            name,
            message,
        } => {
            assert_eq!(query_run_id, "qr-3");
            assert_eq!(name.as_deref(), Some("QueryRunExecutionError"));
            assert!(message.unwrap_or_default().contains("does not exist"));
        }
        other => panic!("expected failed run, got {other:?}"),
    }
    assert!(!server.methods().contains(&"getQueryRunResults".to_owned()));
}

#[tokio::test]
async fn canceled_run_is_reported() {
    let server = spawn_server(vec![MockResponse::result(
        json!({ "queryRun": query_run("qr-4", "QUERY_STATE_CANCELED") }),
    )])
    .await;

    let err = server
        .client()
        .query_with("SELECT 1", &fast_poll())
        .await
        .expect_err("query must fail");

    assert!(matches!(err, FlipsideError::QueryRunCanceled { query_run_id } if query_run_id == "qr-4"));
}

#[tokio::test]
async fn run_still_running_past_deadline_times_out() {
    let server = spawn_server(vec![MockResponse::result(
        json!({ "queryRun": query_run("qr-5", "QUERY_STATE_RUNNING") }),
    )])
    .await;

    let opts = QueryOptions {
        timeout_minutes: 0,
        ..fast_poll()
    };
    let err = server
        .client()
        .query_with("SELECT 1", &opts)
        .await
        .expect_err("query must time out");

    assert!(matches!(err, FlipsideError::QueryRunTimeout { minutes: 0, .. }));
    assert_eq!(server.methods(), vec!["createQueryRun"]);
}

#[tokio::test]
async fn rpc_error_object_is_top_level_error() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::OK,
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32602, "message": "invalid params: sql is required" }
        }),
    )])
    .await;

    let err = server
        .client()
        .create_query_run("", &QueryOptions::default())
        .await
        .expect_err("create must fail");

    match err {
        FlipsideError::Rpc { code, message } => {
            assert_eq!(code, -32602);
            assert!(message.contains("sql is required"));
        }
        other => panic!("expected rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn get_query_results_sends_page_request() {
    let server = spawn_server(vec![MockResponse::result(candle_rows(2, 2, 4, 2))]).await;

    let page = server
        .client()
        .get_query_results("qr-6", 2, 2)
        .await
        .expect("page must load");

    assert_eq!(page.stats.current_page_number, 2);
    assert_eq!(page.stats.total_pages, 2);
    assert_eq!(page.records[0].get_f64("open"), Some(3002.0));

    let params = &server.calls()[0].params;
    assert_eq!(params["queryRunId"], "qr-6");
    assert_eq!(params["format"], "csv");
    assert_eq!(params["page"]["number"], 2);
    assert_eq!(params["page"]["size"], 2);
}

#[tokio::test]
async fn polling_waits_through_streaming_results() {
    let server = spawn_server(vec![
        MockResponse::result(json!({ "queryRun": query_run("qr-12", "QUERY_STATE_RUNNING") })),
        MockResponse::result(
            json!({ "queryRun": query_run("qr-12", "QUERY_STATE_STREAMING_RESULTS") }),
        ),
        MockResponse::result(json!({ "queryRun": query_run("qr-12", "QUERY_STATE_SUCCESS") })),
        MockResponse::result(candle_rows(1, 1, 1, 100_000)),
    ])
    .await;

    let result = server
        .client()
        .query_with("SELECT 1", &fast_poll())
        .await
        .expect("query must succeed");

    assert_eq!(result.run.state, QueryRunState::Success);
    assert_eq!(
        server.methods(),
        vec![
            "createQueryRun",
            "getQueryRun",
            "getQueryRun",
            "getQueryRunResults"
        ]
    );
}

#[tokio::test]
async fn polling_follows_redirected_query_run() {
    let server = spawn_server(vec![
        MockResponse::result(json!({ "queryRun": query_run("qr-13", "QUERY_STATE_RUNNING") })),
        MockResponse::result(json!({
            "queryRun": query_run("qr-13", "QUERY_STATE_CANCELED"),
            "redirectedToQueryRun": query_run("qr-cached", "QUERY_STATE_SUCCESS")
        })),
        MockResponse::result(candle_rows(1, 2, 2, 100_000)),
    ])
    .await;

    let result = server
        .client()
        .query_with("SELECT 1", &fast_poll())
        .await
        .expect("redirected run must be used");

    assert_eq!(result.query_id, "qr-cached");
    assert_eq!(result.handle().total_rows, 2);
    let calls = server.calls();
    assert_eq!(calls[2].method, "getQueryRunResults");
    assert_eq!(calls[2].params["queryRunId"], "qr-cached");
}

#[tokio::test]
async fn cancel_query_run_returns_canceled_run() {
    let server = spawn_server(vec![MockResponse::result(
        json!({ "canceledQueryRun": query_run("qr-7", "QUERY_STATE_CANCELED") }),
    )])
    .await;

    let run = server
        .client()
        .cancel_query_run("qr-7")
        .await
        .expect("cancel must succeed");

    assert_eq!(run.state, QueryRunState::Canceled);
    assert_eq!(server.methods(), vec!["cancelQueryRun"]);
}

#[tokio::test]
async fn paginate_fetches_every_page_through_client() {
    let server = spawn_server(vec![
        MockResponse::result(candle_rows(1, 2, 5, 2)),
        MockResponse::result(candle_rows(2, 2, 5, 2)),
        MockResponse::result(candle_rows(3, 1, 5, 2)),
    ])
    .await;
    let client = server.client();

    let records = paginate(&client, &flipside_candles::QueryHandle::new("qr-8", 5), 2)
        .await
        .expect("pagination must succeed");

    assert_eq!(records.len(), 5);
    let opens: Vec<f64> = records
        .iter()
        .map(|record| record.get_f64("open").expect("open column"))
        .collect();
    assert_eq!(opens, vec![3000.0, 3001.0, 3002.0, 3003.0, 3004.0]);

    let pages: Vec<u64> = server
        .calls()
        .iter()
        .map(|call| call.params["page"]["number"].as_u64().expect("page number"))
        .collect();
    assert_eq!(pages, vec![1, 2, 3]);

    let series = CandleSeries::from_records(&records).expect("rows must form candles");
    let html = CandleChart::default().to_html(&series);
    assert!(html.contains("Candlestick Chart"));
}

#[tokio::test]
async fn paginate_stops_at_first_http_failure() {
    let server = spawn_server(vec![
        MockResponse::result(candle_rows(1, 2, 6, 2)),
        MockResponse::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "result page too large"}),
        ),
        MockResponse::result(candle_rows(3, 2, 6, 2)),
    ])
    .await;
    let client = server.client();

    let err = paginate(&client, &flipside_candles::QueryHandle::new("qr-9", 6), 2)
        .await
        .expect_err("page 2 failure must abort pagination");

    assert!(matches!(err, FlipsideError::Http { status: 500, .. }));
    assert_eq!(server.methods().len(), 2);
}

#[tokio::test]
async fn retries_on_retryable_http_status_when_enabled() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::SERVICE_UNAVAILABLE, json!({"error": "busy"})),
        MockResponse::result(json!({ "queryRun": query_run("qr-10", "QUERY_STATE_READY") })),
    ])
    .await;

    let client = server.client().with_options(ClientOptions {
        timeout_ms: 1_000,
        max_retries: 1,
        retry_backoff_ms: 1,
    });

    let run = client
        .get_query_run("qr-10")
        .await
        .expect("request must succeed after retry");

    assert_eq!(run.id, "qr-10");
    assert_eq!(server.methods().len(), 2);
}

#[tokio::test]
async fn request_timeout_surfaces_transport_error() {
    let server = spawn_server(vec![MockResponse::result(
        json!({ "queryRun": query_run("qr-11", "QUERY_STATE_SUCCESS") }),
    )
    .with_delay(Duration::from_millis(150))])
    .await;

    let client = server.client().with_options(ClientOptions {
        timeout_ms: 20,
        max_retries: 0,
        retry_backoff_ms: 1,
    });

    let err = client
        .get_query_run("qr-11")
        .await
        .expect_err("request must time out");

    match err {
        FlipsideError::Transport(inner) => assert!(inner.is_timeout()),
        other => panic!("expected transport timeout error, got {other:?}"),
    }
}
