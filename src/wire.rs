use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const JSON_RPC_VERSION: &str = "2.0";

pub const CREATE_QUERY_RUN: &str = "createQueryRun";
pub const GET_QUERY_RUN: &str = "getQueryRun";
pub const GET_QUERY_RUN_RESULTS: &str = "getQueryRunResults";
pub const CANCEL_QUERY_RUN: &str = "cancelQueryRun";

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a, P> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: [P; 1],
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse<R> {
    pub result: Option<R>,
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQueryRunParams<'a> {
    #[serde(rename = "resultTTLHours")]
    pub result_ttl_hours: u64,
    pub max_age_minutes: u64,
    pub sql: &'a str,
    pub tags: BTreeMap<&'static str, &'static str>,
    pub data_source: &'a str,
    pub data_provider: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQueryRunResult {
    pub query_run: QueryRun,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRunIdParams<'a> {
    pub query_run_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetQueryRunResult {
    pub query_run: QueryRun,
    #[serde(default)]
    pub redirected_to_query_run: Option<QueryRun>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelQueryRunResult {
    pub canceled_query_run: QueryRun,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetQueryRunResultsParams<'a> {
    pub query_run_id: &'a str,
    pub format: &'static str,
    pub page: PageParams,
}

#[derive(Debug, Serialize)]
pub struct PageParams {
    pub number: u64,
    pub size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetQueryRunResultsResult {
    #[serde(default)]
    pub column_names: Option<Vec<String>>,
    #[serde(default)]
    pub column_types: Option<Vec<String>>,
    #[serde(default)]
    pub rows: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub page: Option<PageStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStats {
    #[serde(default)]
    pub current_page_number: u64,
    #[serde(default)]
    pub current_page_size: u64,
    #[serde(default)]
    pub total_rows: u64,
    #[serde(default)]
    pub total_pages: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRun {
    pub id: String,
    pub state: String,
    #[serde(default)]
    pub error_name: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub total_size: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub ended_at: Option<String>,
}
