//! BSON value formatting for list, table, and tree presentation.

use mongodb::bson::Bson;

/// Get a human-readable type label for a BSON value.
pub fn bson_type_label(value: &Bson) -> &'static str {
    match value {
        Bson::Document(_) => "Document",
        Bson::Array(_) => "Array",
        Bson::String(_) => "String",
        Bson::Int32(_) => "Int32",
        Bson::Int64(_) => "Int64",
        Bson::Double(_) => "Double",
        Bson::Decimal128(_) => "Decimal128",
        Bson::Boolean(_) => "Bool",
        Bson::Null => "Null",
        Bson::ObjectId(_) => "ObjectId",
        Bson::DateTime(_) => "Date",
        Bson::Timestamp(_) => "Timestamp",
        Bson::Binary(_) => "Binary",
        Bson::RegularExpression(_) => "Regex",
        _ => "Value",
    }
}

/// One-line preview of a BSON value, truncated to `max_len` characters.
pub fn bson_value_preview(value: &Bson, max_len: usize) -> String {
    match value {
        Bson::String(s) => truncate_for_preview(s, max_len),
        Bson::Int32(n) => n.to_string(),
        Bson::Int64(n) => n.to_string(),
        Bson::Double(n) => n.to_string(),
        Bson::Boolean(b) => b.to_string(),
        Bson::Null => "null".to_string(),
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::DateTime(dt) => dt.try_to_rfc3339_string().unwrap_or_else(|_| format!("{dt:?}")),
        Bson::Document(doc) => format!("{{{} fields}}", doc.len()),
        Bson::Array(arr) => format!("[{} items]", arr.len()),
        Bson::RegularExpression(regex) => format!("/{}/{}", regex.pattern, regex.options),
        other => truncate_for_preview(&other.to_string(), max_len),
    }
}

/// Truncate a string for preview display, adding an ellipsis if needed.
pub fn truncate_for_preview(input: &str, max_len: usize) -> String {
    if input.chars().count() <= max_len {
        return input.to_string();
    }

    let keep = max_len.saturating_sub(3);
    let mut output: String = input.chars().take(keep).collect();
    output.push_str("...");
    output
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;

    use super::*;

    #[test]
    fn previews_containers_by_size() {
        let value = Bson::Document(doc! { "a": 1, "b": 2 });
        assert_eq!(bson_value_preview(&value, 40), "{2 fields}");
        assert_eq!(bson_value_preview(&Bson::Array(vec![Bson::Null]), 40), "[1 items]");
        assert_eq!(bson_type_label(&Bson::Int64(1)), "Int64");
    }

    #[test]
    fn truncates_long_strings() {
        assert_eq!(truncate_for_preview("abcdefghij", 6), "abc...");
        assert_eq!(truncate_for_preview("abc", 6), "abc");
        assert_eq!(truncate_for_preview("ééééééé", 5), "éé...");
    }
}
