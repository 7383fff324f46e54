//! Value semantics of compiled units

use serde_json::Value;
use std::borrow::Cow;

/// Only `null` and `false` are falsy
pub(crate) fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// Text printed for `value`, or the kind of value that cannot be printed
pub(crate) fn printable(value: &Value) -> Result<Cow<'_, str>, &'static str> {
    match value {
        Value::Null => Ok(Cow::Borrowed("")),
        Value::String(text) => Ok(Cow::Borrowed(text)),
        Value::Bool(flag) => Ok(Cow::Owned(flag.to_string())),
        Value::Number(number) => Ok(Cow::Owned(number.to_string())),
        Value::Array(_) => Err("an array"),
        Value::Object(_) => Err("an object"),
    }
}

/// Look `key` up in `value`
///
/// Objects yield `null` for a missing key, arrays accept numeric indices; `None`
/// means `value` cannot be indexed at all.
pub(crate) fn index<'v>(value: &'v Value, key: &str) -> Option<Cow<'v, Value>> {
    match value {
        Value::Object(map) => Some(
            map.get(key)
                .map(Cow::Borrowed)
                .unwrap_or(Cow::Owned(Value::Null)),
        ),
        Value::Array(items) => {
            let position: usize = key.parse().ok()?;
            Some(
                items
                    .get(position)
                    .map(Cow::Borrowed)
                    .unwrap_or(Cow::Owned(Value::Null)),
            )
        }
        _ => None,
    }
}

pub(crate) fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!(false)));
        assert!(truthy(&json!(0)));
        assert!(truthy(&json!("")));
        assert!(truthy(&json!([])));
    }

    #[test]
    fn test_printable_values() {
        assert_eq!(printable(&json!("text")).unwrap(), "text");
        assert_eq!(printable(&json!(42)).unwrap(), "42");
        assert_eq!(printable(&json!(1.5)).unwrap(), "1.5");
        assert_eq!(printable(&json!(true)).unwrap(), "true");
        assert_eq!(printable(&Value::Null).unwrap(), "");
        assert_eq!(printable(&json!([1])).unwrap_err(), "an array");
        assert_eq!(printable(&json!({"a": 1})).unwrap_err(), "an object");
    }

    #[test]
    fn test_index() {
        let value = json!({"tags": ["a", "b"], "name": "x"});
        assert_eq!(index(&value, "name").unwrap().as_ref(), &json!("x"));
        assert_eq!(index(&value, "missing").unwrap().as_ref(), &Value::Null);

        let tags = &value["tags"];
        assert_eq!(index(tags, "1").unwrap().as_ref(), &json!("b"));
        assert_eq!(index(tags, "5").unwrap().as_ref(), &Value::Null);
        assert!(index(tags, "first").is_none());
        assert!(index(&json!("x"), "len").is_none());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<a href=\"x\">Tom & Jerry's</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
        assert!(matches!(escape_html("plain"), Cow::Borrowed("plain")));
    }
}
