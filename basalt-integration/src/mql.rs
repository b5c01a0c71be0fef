//! Document functions backing the `MQL_*` and mongo comparison operators.
//!
//! Missing paths read as null. Paths are dotted, `a.b` addresses field `b` of the object held
//! by field `a`.
use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::value::{compare_values, double, values_equal};

/// Value at `path` inside `document`, null when any segment is missing or the document isn't an
/// object.
pub fn query_value<S: AsRef<str>>(document: &Value, path: &[S]) -> Value {
    let mut current = document;
    for segment in path {
        match current {
            Value::Object(map) => match map.get(segment.as_ref()) {
                Some(value) => current = value,
                None => return Value::Null,
            },
            _ => return Value::Null,
        }
    }
    current.clone()
}

/// Whether every segment of `path` is present.
pub fn exists<S: AsRef<str>>(document: &Value, path: &[S]) -> bool {
    let mut current = document;
    for segment in path {
        match current.as_object().and_then(|map| map.get(segment.as_ref())) {
            Some(value) => current = value,
            None => return false,
        }
    }
    true
}

/// Sets the dotted `path` to `value`, creating intermediate objects. Non object values on the
/// way are replaced.
pub fn set_path(document: &mut Value, path: &str, value: Value) {
    let mut current = document;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let map = match current.as_object_mut() {
            Some(map) => map,
            None => return,
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Removes the dotted `path`, missing paths are ignored.
pub fn remove_path(document: &mut Value, path: &str) {
    let (parent, last) = match path.rsplit_once('.') {
        Some((parent, last)) => (Some(parent), last),
        None => (None, path),
    };
    let mut current = document;
    if let Some(parent) = parent {
        for segment in parent.split('.') {
            match current.as_object_mut().and_then(|map| map.get_mut(segment)) {
                Some(value) => current = value,
                None => return,
            }
        }
    }
    if let Some(map) = current.as_object_mut() {
        map.remove(last);
    }
}

/// New document with each `names[i]` set to `values[i]`.
pub fn merge(names: &[String], values: Vec<Value>) -> Value {
    add_fields(Value::Object(Map::new()), names, values)
}

pub fn add_fields(mut document: Value, names: &[String], values: Vec<Value>) -> Value {
    for (name, value) in names.iter().zip(values) {
        set_path(&mut document, name, value);
    }
    document
}

pub fn exclude(mut document: Value, paths: &[String]) -> Value {
    for path in paths {
        remove_path(&mut document, path);
    }
    document
}

/// Group keys are kept as they are, missing values already read as null.
pub fn not_unset(value: Value) -> Value {
    value
}

/// Euclidean distance between two `[x, y]` points, null when either isn't a point.
pub fn geo_distance(left: &Value, right: &Value) -> Value {
    match (point(left), point(right)) {
        (Some((x1, y1)), Some((x2, y2))) => double(((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt()),
        _ => Value::Null,
    }
}

fn point(value: &Value) -> Option<(f64, f64)> {
    match value.as_array()?.as_slice() {
        [x, y] => Some((x.as_f64()?, y.as_f64()?)),
        _ => None,
    }
}

/// `$eq`: an array matches when it contains the value, null only matches null.
pub fn mql_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Array(values), other) if !other.is_array() => {
            values.iter().any(|value| values_equal(value, other))
        }
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        _ => values_equal(left, right),
    }
}

/// Ordering comparison of `$gt`, `$gte`, `$lt` and `$lte`, only numbers are comparable.
pub fn mql_compare(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_number() && right.is_number() {
        Some(compare_values(left, right))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use serde_json::json;

    use crate::mql::{
        add_fields, exclude, exists, geo_distance, merge, mql_compare, mql_equals, query_value,
    };

    #[test]
    fn test_query_value() {
        let document = json!({"customer": {"id": 1}, "amount": 10});
        assert_eq!(json!(1), query_value(&document, &["customer", "id"]));
        assert_eq!(json!(null), query_value(&document, &["customer", "name"]));
        assert_eq!(json!(null), query_value(&document, &["amount", "value"]));
        assert!(exists(&document, &["customer", "id"]));
        assert!(!exists(&document, &["missing"]));
    }

    #[test]
    fn test_reshape() {
        let names = vec!["_id".to_string(), "stats.total".to_string()];
        assert_eq!(
            json!({"_id": 1, "stats": {"total": 15}}),
            merge(&names, vec![json!(1), json!(15)])
        );

        let document = json!({"a": 1, "b": {"c": 2, "d": 3}});
        assert_eq!(
            json!({"a": 1, "b": {"c": 2, "d": 3}, "e": true}),
            add_fields(document.clone(), &["e".to_string()], vec![json!(true)])
        );
        assert_eq!(
            json!({"b": {"d": 3}}),
            exclude(document, &["a".to_string(), "b.c".to_string(), "x.y".to_string()])
        );
    }

    #[test]
    fn test_comparisons() {
        assert!(mql_equals(&json!([1, 2]), &json!(2)));
        assert!(mql_equals(&json!(null), &json!(null)));
        assert!(!mql_equals(&json!(null), &json!(0)));
        assert_eq!(Some(Ordering::Greater), mql_compare(&json!(10), &json!(5)));
        assert_eq!(None, mql_compare(&json!("10"), &json!(5)));
    }

    #[test]
    fn test_geo_distance() {
        assert_eq!(json!(5.0), geo_distance(&json!([0, 0]), &json!([3.0, 4.0])));
        assert_eq!(json!(null), geo_distance(&json!({"x": 0}), &json!([3.0, 4.0])));
    }
}
