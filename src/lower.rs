use apache_avro::types::Value as AvroValue;

use crate::datum::Datum;

/// Lower a mapped [`Datum`] into the container writer's value tree.
pub fn to_avro(datum: Datum) -> AvroValue {
    match datum {
        Datum::Null => AvroValue::Null,
        Datum::Boolean(b) => AvroValue::Boolean(b),
        Datum::Int(i) => AvroValue::Int(i),
        Datum::Long(i) => AvroValue::Long(i),
        Datum::Float(f) => AvroValue::Float(f),
        Datum::Double(f) => AvroValue::Double(f),
        Datum::Bytes(b) => AvroValue::Bytes(b),
        Datum::String(s) => AvroValue::String(s),
        Datum::Fixed(b) => AvroValue::Fixed(b.len(), b),
        Datum::Enum { index, symbol } => AvroValue::Enum(index, symbol),
        Datum::Union { branch, value } => AvroValue::Union(branch, Box::new(to_avro(*value))),
        Datum::Array(items) => AvroValue::Array(items.into_iter().map(to_avro).collect()),
        Datum::Map(entries) => AvroValue::Map(
            entries.into_iter().map(|(k, v)| (k, to_avro(v))).collect(),
        ),
        Datum::Record(fields) => AvroValue::Record(
            fields.into_iter().map(|(k, v)| (k, to_avro(v))).collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn record_fields_keep_their_order() {
        let mut fields = IndexMap::new();
        fields.insert("b".to_string(), Datum::Int(2));
        fields.insert("a".to_string(), Datum::union(1, Datum::String("x".into())));
        let lowered = to_avro(Datum::Record(fields));
        assert_eq!(
            lowered,
            AvroValue::Record(vec![
                ("b".to_string(), AvroValue::Int(2)),
                ("a".to_string(), AvroValue::Union(1, Box::new(AvroValue::String("x".into())))),
            ])
        );
    }

    #[test]
    fn fixed_carries_its_length() {
        assert_eq!(to_avro(Datum::Fixed(vec![1, 2, 3])), AvroValue::Fixed(3, vec![1, 2, 3]));
    }
}
