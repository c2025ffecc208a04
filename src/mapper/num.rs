use serde_json::Value;

/// A JSON integer as seen by the mapper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Integer {
    Fits(i64),
    /// Positive integer beyond `i64::MAX`.
    Overflow(u64),
}

/// JSON integers only; reals (even integral ones like `1.0`) yield `None`.
pub fn integer(v: &Value) -> Option<Integer> {
    let Value::Number(n) = v else { return None };
    if let Some(i) = n.as_i64() {
        Some(Integer::Fits(i))
    } else {
        n.as_u64().map(Integer::Overflow)
    }
}

/// JSON reals only; integers yield `None`.
pub fn real(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) if n.is_f64() => n.as_f64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_and_reals_do_not_cross() {
        assert_eq!(integer(&json!(5)), Some(Integer::Fits(5)));
        assert_eq!(integer(&json!(-5)), Some(Integer::Fits(-5)));
        assert_eq!(integer(&json!(5.0)), None);
        assert_eq!(real(&json!(5.0)), Some(5.0));
        assert_eq!(real(&json!(5)), None);
        assert_eq!(integer(&json!("5")), None);
    }

    #[test]
    fn huge_integers_are_flagged() {
        assert_eq!(integer(&json!(u64::MAX)), Some(Integer::Overflow(u64::MAX)));
    }
}
