//! Hand-rolled CSV/TSV writer.
//!
//! Delegating to a generic CSV-writing crate would mean configuring it for
//! two distinct input shapes (list-of-objects and dict-of-columns) and
//! still auditing its quoting behavior against the exact rule specified
//! here; writing the small state machine directly is easier to verify
//! byte-for-byte.

use serde_json::Value;

/// Encodes a JSON value as CSV/TSV bytes using `separator` as the field
/// delimiter (`,` for CSV, `\t` for TSV).
///
/// Accepts either a list of objects (headers are the union of keys in
/// insertion order; missing keys yield empty fields) or a dict of equal-
/// length column arrays (keys are headers).
pub fn encode(value: &Value, separator: u8) -> Result<Vec<u8>, String> {
    let (headers, rows) = shape(value)?;
    let mut out = Vec::new();
    write_row(&mut out, &headers, separator);
    for row in rows {
        write_row(&mut out, &row, separator);
    }
    Ok(out)
}

fn shape(value: &Value) -> Result<(Vec<String>, Vec<Vec<String>>), String> {
    match value {
        Value::Array(items) => shape_list_of_objects(items),
        Value::Object(columns) => shape_dict_of_columns(columns),
        _ => Err("csv/tsv payload must be a list of objects or a dict of columns".to_string()),
    }
}

fn shape_list_of_objects(items: &[Value]) -> Result<(Vec<String>, Vec<Vec<String>>), String> {
    let mut headers: Vec<String> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut objects = Vec::with_capacity(items.len());

    for item in items {
        let obj = item
            .as_object()
            .ok_or_else(|| "csv/tsv list entries must be objects".to_string())?;
        for key in obj.keys() {
            if seen.insert(key.clone()) {
                headers.push(key.clone());
            }
        }
        objects.push(obj);
    }

    let rows = objects
        .into_iter()
        .map(|obj| {
            headers
                .iter()
                .map(|h| obj.get(h).map(scalar_to_field).unwrap_or_default())
                .collect()
        })
        .collect();

    Ok((headers, rows))
}

fn shape_dict_of_columns(
    columns: &serde_json::Map<String, Value>,
) -> Result<(Vec<String>, Vec<Vec<String>>), String> {
    let headers: Vec<String> = columns.keys().cloned().collect();
    let mut column_values = Vec::with_capacity(headers.len());
    let mut len = None;

    for header in &headers {
        let arr = columns[header]
            .as_array()
            .ok_or_else(|| format!("column '{header}' must be a list"))?;
        match len {
            None => len = Some(arr.len()),
            Some(expected) if expected != arr.len() => {
                return Err("all columns must have equal length".to_string())
            }
            _ => {}
        }
        column_values.push(arr);
    }

    let row_count = len.unwrap_or(0);
    let mut rows = Vec::with_capacity(row_count);
    for i in 0..row_count {
        rows.push(
            column_values
                .iter()
                .map(|col| scalar_to_field(&col[i]))
                .collect(),
        );
    }

    Ok((headers, rows))
}

fn scalar_to_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn write_row(out: &mut Vec<u8>, fields: &[String], separator: u8) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(separator);
        }
        write_field(out, field, separator);
    }
    out.push(b'\n');
}

fn write_field(out: &mut Vec<u8>, field: &str, separator: u8) {
    let needs_quoting = field.bytes().any(|b| b == separator || b == b'"' || b == b'\n' || b == b'\r');
    if !needs_quoting {
        out.extend_from_slice(field.as_bytes());
        return;
    }
    out.push(b'"');
    for ch in field.chars() {
        if ch == '"' {
            out.push(b'"');
        }
        let mut buf = [0u8; 4];
        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    }
    out.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_of_objects_aligns_to_union_headers() {
        let value = json!([{"a": 1, "b": 2}, {"a": 3}]);
        let bytes = encode(&value, b',').unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "a,b\n1,2\n3,\n");
    }

    #[test]
    fn dict_of_columns_encodes_rows() {
        let value = json!({"a": [1, 2], "b": [3, 4]});
        let bytes = encode(&value, b',').unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "a,b\n1,3\n2,4\n");
    }

    #[test]
    fn quotes_fields_containing_separator() {
        let value = json!([{"a": "x,y"}]);
        let bytes = encode(&value, b',').unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "a\n\"x,y\"\n");
    }

    #[test]
    fn doubles_inner_quotes() {
        let value = json!([{"a": "say \"hi\""}]);
        let bytes = encode(&value, b',').unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "a\n\"say \"\"hi\"\"\"\n");
    }

    #[test]
    fn tsv_uses_tab_separator() {
        let value = json!([{"a": 1, "b": 2}]);
        let bytes = encode(&value, b'\t').unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "a\tb\n1\t2\n");
    }
}
