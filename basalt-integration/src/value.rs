//! Runtime values and their ordering.
use std::cmp::Ordering;

use basalt::rex::LiteralValue;
use itertools::Itertools;
use serde_json::{Number, Value};

/// One row, documents are rows holding a single object.
pub type Row = Vec<Value>;

pub fn literal_to_value(literal: &LiteralValue) -> Value {
    match literal {
        LiteralValue::Null => Value::Null,
        LiteralValue::Boolean(b) => Value::Bool(*b),
        LiteralValue::Integer(i) => Value::from(*i),
        LiteralValue::Double(d) => double(*d),
        LiteralValue::String(s) => Value::String(s.clone()),
        LiteralValue::List(values) => Value::Array(values.iter().map(literal_to_value).collect()),
    }
}

/// Json number of `d`, null for NaN and infinities.
pub fn double(d: f64) -> Value {
    Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order used by sorts and min/max. Nulls sort lowest, values of different types are
/// ordered by type.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| compare_values(x, y))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (Value::Object(_), Value::Object(_)) => canonical(left).cmp(&canonical(right)),
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => {
            let x = a.as_f64().unwrap_or(f64::NAN);
            let y = b.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
    }
}

/// Equality treating `1` and `1.0` as equal.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    type_rank(left) == type_rank(right) && compare_values(left, right) == Ordering::Equal
}

/// Sql comparison, null when either side is null.
pub fn sql_compare(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_null() || right.is_null() {
        None
    } else {
        Some(compare_values(left, right))
    }
}

/// Canonical text of a row, used as grouping key and to compare results ignoring order.
pub fn row_key(row: &[Value]) -> String {
    row.iter().map(canonical).join("|")
}

fn canonical(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Array(values) => format!("[{}]", values.iter().map(canonical).join(",")),
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(key, value)| format!("{:?}:{}", key, canonical(value)))
                .join(",")
        ),
        other => other.to_string(),
    }
}

/// Rows ordered by their canonical text.
pub fn sorted_rows(rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter()
        .sorted_by_key(|row| row_key(row))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use serde_json::json;

    use crate::value::{compare_values, row_key, sorted_rows, values_equal};

    #[test]
    fn test_compare_values() {
        assert_eq!(Ordering::Less, compare_values(&json!(null), &json!(0)));
        assert_eq!(Ordering::Less, compare_values(&json!(1), &json!(1.5)));
        assert_eq!(Ordering::Greater, compare_values(&json!("b"), &json!("a")));
        assert_eq!(Ordering::Less, compare_values(&json!([1, 2]), &json!([1, 2, 0])));
        assert!(values_equal(&json!(2), &json!(2.0)));
        assert!(!values_equal(&json!(2), &json!("2")));
    }

    #[test]
    fn test_row_key_ignores_number_representation() {
        assert_eq!(
            row_key(&[json!({"_id": 1, "total": 15})]),
            row_key(&[json!({"_id": 1, "total": 15.0})])
        );
        assert_eq!(
            vec![vec![json!(1)], vec![json!(2)]],
            sorted_rows(vec![vec![json!(2)], vec![json!(1)]])
        );
    }
}
