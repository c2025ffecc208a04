use serde_json::{Map, Value};

/// Cap `s` at `max` bytes (`0` = unlimited).
///
/// The cut backs off to the previous char boundary when `max` lands inside a
/// multi-byte character, so the result never exceeds `max` bytes.
pub fn truncate(mut s: String, max: usize) -> String {
    if max > 0 && s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
    }
    s
}

/// Compact JSON text with object keys sorted at every depth.
pub fn dump_sorted(value: &Value) -> String {
    sort_keys(value).to_string()
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::with_capacity(map.len());
            for k in keys {
                out.insert(k.clone(), sort_keys(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(xs) => Value::Array(xs.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Raw text bytes of a JSON string, ending at the first embedded NUL.
pub fn bytes_payload(s: &str) -> Vec<u8> {
    let end = s.find('\0').unwrap_or(s.len());
    s.as_bytes()[..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truncates_to_exact_byte_count() {
        assert_eq!(truncate("hello".into(), 3), "hel");
        assert_eq!(truncate("hello".into(), 5), "hello");
        assert_eq!(truncate("hello".into(), 0), "hello");
    }

    #[test]
    fn truncation_never_exceeds_limit_inside_multibyte_char() {
        // "é" is two bytes; a 2-byte cap on "aé" lands mid-character
        let out = truncate("aé".into(), 2);
        assert_eq!(out, "a");
        assert!(out.len() <= 2);
    }

    #[test]
    fn dump_sorts_keys_recursively() {
        let v = json!({"b": 1, "a": {"z": [true, null], "y": 1.5}});
        assert_eq!(dump_sorted(&v), r#"{"a":{"y":1.5,"z":[true,null]},"b":1}"#);
        assert_eq!(dump_sorted(&json!(7)), "7");
    }

    #[test]
    fn bytes_stop_at_nul() {
        assert_eq!(bytes_payload("ab\0cd"), b"ab".to_vec());
        assert_eq!(bytes_payload("abc"), b"abc".to_vec());
    }
}
