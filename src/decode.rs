use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::{
    types::{PageStats, QueryRun},
    value::parse_timestamp,
    wire, FlipsideError, Page, Record, Value,
};

pub(crate) fn decode_query_run(run: wire::QueryRun) -> Result<QueryRun, FlipsideError> {
    Ok(QueryRun {
        state: run.state.parse()?,
        id: run.id,
        error_name: run.error_name,
        error_message: run.error_message,
        row_count: run.row_count,
        total_size: run.total_size,
        created_at: run.created_at.as_deref().and_then(parse_timestamp),
        started_at: run.started_at.as_deref().and_then(parse_timestamp),
        ended_at: run.ended_at.as_deref().and_then(parse_timestamp),
    })
}

pub(crate) fn decode_page(result: wire::GetQueryRunResultsResult) -> Result<Page, FlipsideError> {
    let columns = result.column_names.unwrap_or_default();
    let column_types = result.column_types.unwrap_or_default();
    let rows = result.rows.unwrap_or_default();

    if !column_types.is_empty() && column_types.len() != columns.len() {
        return Err(FlipsideError::Decode(format!(
            "column type count mismatch: {} names, {} types",
            columns.len(),
            column_types.len()
        )));
    }

    let shared: Arc<[String]> = columns.clone().into();
    let records = rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| decode_row(&shared, &column_types, row, index))
        .collect::<Result<Vec<_>, _>>()?;

    let stats = result
        .page
        .map(|page| PageStats {
            current_page_number: page.current_page_number,
            current_page_size: page.current_page_size,
            total_rows: page.total_rows,
            total_pages: page.total_pages,
        })
        .unwrap_or_default();

    Ok(Page {
        columns,
        column_types,
        records,
        stats,
    })
}

fn decode_row(
    columns: &Arc<[String]>,
    column_types: &[String],
    row: JsonValue,
    index: usize,
) -> Result<Record, FlipsideError> {
    let cells = match row {
        JsonValue::Array(cells) => {
            if cells.len() != columns.len() {
                return Err(FlipsideError::Decode(format!(
                    "row {index} has {} cells, expected {}",
                    cells.len(),
                    columns.len()
                )));
            }
            cells
        }
        JsonValue::Object(mut fields) => columns
            .iter()
            .map(|name| fields.remove(name).unwrap_or(JsonValue::Null))
            .collect(),
        other => {
            return Err(FlipsideError::Decode(format!(
                "row {index} is neither an array nor an object: {other}"
            )))
        }
    };

    let values = cells
        .into_iter()
        .enumerate()
        .map(|(col, cell)| decode_cell(cell, column_types.get(col).map(String::as_str)))
        .collect::<Result<Vec<_>, _>>()?;

    Record::new(Arc::clone(columns), values)
        .ok_or_else(|| FlipsideError::Decode(format!("row {index} is misaligned with columns")))
}

/// Converts one JSON cell, using the column type to recover timestamps and
/// numbers the service sends as strings.
pub(crate) fn decode_cell(
    cell: JsonValue,
    column_type: Option<&str>,
) -> Result<Value, FlipsideError> {
    let kind = column_type.map(ColumnKind::classify).unwrap_or(ColumnKind::Other);
    match cell {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Bool(value) => Ok(Value::Boolean(value)),
        JsonValue::Number(number) => {
            if let Some(value) = number.as_i64() {
                return Ok(Value::Integer(value));
            }
            number
                .as_f64()
                .filter(|value| value.is_finite())
                .map(Value::Float)
                .ok_or_else(|| {
                    FlipsideError::Decode(format!("unsupported numeric value '{number}'"))
                })
        }
        JsonValue::String(text) => Ok(match kind {
            ColumnKind::Temporal => parse_timestamp(&text)
                .map(Value::Timestamp)
                .unwrap_or(Value::Text(text)),
            ColumnKind::Numeric => {
                if let Ok(value) = text.parse::<i64>() {
                    Value::Integer(value)
                } else {
                    match text.parse::<f64>() {
                        Ok(value) if value.is_finite() => Value::Float(value),
                        _ => Value::Text(text),
                    }
                }
            }
            ColumnKind::Other => Value::Text(text),
        }),
        nested @ (JsonValue::Array(_) | JsonValue::Object(_)) => Ok(Value::Text(nested.to_string())),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ColumnKind {
    Temporal,
    Numeric,
    Other,
}

impl ColumnKind {
    fn classify(column_type: &str) -> Self {
        let lower = column_type.to_ascii_lowercase();
        if lower.contains("timestamp") || lower.contains("date") {
            Self::Temporal
        } else if ["number", "fixed", "real", "float", "double", "decimal", "int"]
            .iter()
            .any(|name| lower.contains(name))
        {
            Self::Numeric
        } else {
            Self::Other
        }
    }
}
