//! Bulk Result Importer
//!
//! Accepts three JSON shapes for bulk test-case input and normalizes them to
//! `CanonicalTestCase`:
//!
//! 1. `[{"input": {"nums": [2, 7]}, "expected_output": 9, "is_sample": true}]`
//!    where `input` is keyed by parameter name, a scalar, or a string
//! 2. the same array with `input` already a positional argument array
//! 3. `{"parameters": ["nums", "expected_output"], "rows": [[[2, 7], 9]]}`
//!
//! Pure transformation, no I/O.

use crate::error::ParseError;
use serde_json::{Map, Value};
use verdict_common::types::{CanonicalTestCase, Parameter};

const EXPECTED_OUTPUT: &str = "expected_output";
const IS_SAMPLE: &str = "is_sample";
const IS_HIDDEN: &str = "is_hidden";

/// Parse and normalize a bulk import payload against a problem's parameters
pub fn import_test_cases(
    raw: &str,
    parameters: &[Parameter],
) -> Result<Vec<CanonicalTestCase>, ParseError> {
    let parsed: Value =
        serde_json::from_str(raw).map_err(|e| ParseError::new(format!("Invalid JSON: {}", e)))?;

    let cases = match &parsed {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(idx, item)| from_record(idx, item, parameters))
            .collect::<Result<Vec<_>, _>>()?,
        Value::Object(map) if is_columnar(map) => from_columns(map, parameters)?,
        _ => {
            return Err(ParseError::new(
                "Invalid JSON structure. Expected an array of objects or an object with \"parameters\" and \"rows\".",
            ))
        }
    };

    if cases.is_empty() {
        return Err(ParseError::new("No test cases found in JSON."));
    }
    Ok(cases)
}

fn is_columnar(map: &Map<String, Value>) -> bool {
    map.get("parameters").is_some_and(Value::is_array) && map.get("rows").is_some_and(Value::is_array)
}

fn from_record(
    idx: usize,
    item: &Value,
    parameters: &[Parameter],
) -> Result<CanonicalTestCase, ParseError> {
    let record = item
        .as_object()
        .ok_or_else(|| ParseError::new(format!("Test case #{} must be an object.", idx + 1)))?;

    let expected = record.get(EXPECTED_OUTPUT).ok_or_else(missing_expected_output)?;

    Ok(CanonicalTestCase {
        input: normalize_input(record.get("input"), parameters),
        expected_output: expected.to_string(),
        is_sample: record.get(IS_SAMPLE).is_some_and(truthy),
        is_hidden: record.get(IS_HIDDEN).is_some_and(truthy),
    })
}

/// Encode a record's `input` as a JSON argument array
fn normalize_input(input: Option<&Value>, parameters: &[Parameter]) -> String {
    match input {
        Some(Value::Object(keyed)) if !parameters.is_empty() => {
            let positional: Vec<Value> = parameters
                .iter()
                .map(|p| keyed.get(&p.name).cloned().unwrap_or(Value::Null))
                .collect();
            Value::Array(positional).to_string()
        }
        Some(value @ (Value::Object(_) | Value::Array(_))) => value.to_string(),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(_)) => text.clone(),
            Ok(scalar) => Value::Array(vec![scalar]).to_string(),
            Err(_) => Value::Array(vec![Value::String(text.clone())]).to_string(),
        },
        Some(Value::Null) | None => "[]".to_string(),
        Some(scalar) => Value::Array(vec![scalar.clone()]).to_string(),
    }
}

fn from_columns(
    map: &Map<String, Value>,
    parameters: &[Parameter],
) -> Result<Vec<CanonicalTestCase>, ParseError> {
    let columns: Vec<&str> = map
        .get("parameters")
        .and_then(Value::as_array)
        .map(|cols| cols.iter().map(Value::as_str).collect::<Option<Vec<_>>>())
        .unwrap_or_default()
        .ok_or_else(|| ParseError::new("\"parameters\" must be an array of column names."))?;

    let position = |name: &str| columns.iter().position(|c| *c == name);
    let expected_idx = position(EXPECTED_OUTPUT).ok_or_else(missing_expected_output)?;
    let sample_idx = position(IS_SAMPLE);
    let hidden_idx = position(IS_HIDDEN);

    let rows = map.get("rows").and_then(Value::as_array).cloned().unwrap_or_default();

    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            let cells = row
                .as_array()
                .ok_or_else(|| ParseError::new(format!("Row #{} must be an array.", idx + 1)))?;
            let cell = |i: usize| cells.get(i);

            let expected = cell(expected_idx).ok_or_else(missing_expected_output)?;

            let input = if parameters.is_empty() {
                match cells.first() {
                    Some(first @ Value::Array(_)) => first.to_string(),
                    Some(first) => Value::Array(vec![first.clone()]).to_string(),
                    None => "[]".to_string(),
                }
            } else {
                let values: Vec<Value> = columns
                    .iter()
                    .enumerate()
                    .filter(|(_, name)| !matches!(**name, EXPECTED_OUTPUT | IS_SAMPLE | IS_HIDDEN))
                    .map(|(i, _)| cell(i).cloned().unwrap_or(Value::Null))
                    .collect();
                Value::Array(values).to_string()
            };

            Ok(CanonicalTestCase {
                input,
                expected_output: expected.to_string(),
                is_sample: sample_idx.and_then(cell).is_some_and(truthy),
                is_hidden: hidden_idx.and_then(cell).is_some_and(truthy),
            })
        })
        .collect()
}

fn missing_expected_output() -> ParseError {
    ParseError::new("Each test case must have an expected_output.")
}

/// Loose truthiness, so `1`, `"yes"` and `true` all mark a flag
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Placeholder value for a declared parameter or return type
fn default_for_type(type_name: &str) -> Value {
    match type_name.to_lowercase().as_str() {
        "integer" | "double" => Value::from(0),
        "integer_array" => Value::from(vec![0, 1, 2]),
        "string" => Value::from(""),
        "string_array" => Value::from(vec!["a", "b"]),
        "boolean" => Value::Bool(false),
        _ => Value::Null,
    }
}

/// Pretty-printed single-record template for the array shape
pub fn generate_template(parameters: &[Parameter], return_type: Option<&str>) -> String {
    let input = if parameters.is_empty() {
        Value::from("input_string")
    } else {
        Value::Object(
            parameters
                .iter()
                .map(|p| (p.name.clone(), default_for_type(&p.param_type)))
                .collect(),
        )
    };
    let expected = return_type
        .map(default_for_type)
        .unwrap_or_else(|| Value::from("expected_value"));

    let template = serde_json::json!([{
        "input": input,
        "expected_output": expected,
        "is_sample": false,
    }]);
    serde_json::to_string_pretty(&template).unwrap_or_else(|_| template.to_string())
}
