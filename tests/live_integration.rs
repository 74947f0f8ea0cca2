use std::path::Path;

use flipside_candles::{
    paginate, read_api_key, FlipsideClient, FlipsideError, QueryOptions, DEFAULT_API_KEY_PATH,
};

/// Uses `FLIPSIDE_API_KEY_FILE` when set, otherwise `api_key.txt` in the crate root.
fn load_live_api_key() -> Result<String, String> {
    let path = std::env::var("FLIPSIDE_API_KEY_FILE")
        .unwrap_or_else(|_| DEFAULT_API_KEY_PATH.to_owned());
    if !Path::new(&path).exists() {
        return Err(format!("{path} not found"));
    }
    read_api_key(&path).map_err(|err| err.to_string())
}

#[tokio::test]
async fn live_query_paginates_all_rows() {
    let api_key = match load_live_api_key() {
        Ok(key) => key,
        Err(reason) => {
            eprintln!("skipping live test: {reason}");
            return;
        }
    };

    let client = FlipsideClient::new(api_key);
    let opts = QueryOptions {
        cached: false,
        page_size: 5,
        ..QueryOptions::default()
    };

    let result_set = client
        .query_with(
            "SELECT block_number FROM ethereum.core.fact_blocks ORDER BY block_number DESC LIMIT 12",
            &opts,
        )
        .await
        .expect("live query must succeed");
    let handle = result_set.handle();
    assert_eq!(handle.total_rows, 12);

    let rows = paginate(&client, &handle, 5)
        .await
        .expect("pagination must succeed");
    assert_eq!(rows.len(), 12);

    let block_numbers: Vec<i64> = rows
        .iter()
        .map(|row| row.get_i64("block_number").expect("block_number must be an integer"))
        .collect();
    assert!(block_numbers.windows(2).all(|pair| pair[0] > pair[1]));

    let err = client
        .query_with("SELECT * FROM no_such_schema.no_such_table", &opts)
        .await
        .expect_err("invalid query must fail");
    assert!(matches!(
        err,
        FlipsideError::QueryRunFailed { .. } | FlipsideError::Rpc { .. }
    ));
}
