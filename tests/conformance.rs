//! Values built to conform to a schema always map, and always encode.

use json2avro::sink::DEFAULT_BLOCK_SIZE;
use json2avro::{AvroSink, CodecChoice, MapErrorKind, MapOptions, Mapper, RecordSink, Schema};
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone)]
enum Shape {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    Str,
    Fixed(usize),
    Array(Box<Shape>),
    Map(Box<Shape>),
    Record(Vec<Shape>),
    Nullable(Box<Shape>),
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        Just(Shape::Null),
        Just(Shape::Boolean),
        Just(Shape::Int),
        Just(Shape::Long),
        Just(Shape::Float),
        Just(Shape::Double),
        Just(Shape::Bytes),
        Just(Shape::Str),
        (1usize..5).prop_map(Shape::Fixed),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(|s| Shape::Array(Box::new(s))),
            inner.clone().prop_map(|s| Shape::Map(Box::new(s))),
            vec(inner.clone(), 1..4).prop_map(Shape::Record),
            inner.prop_map(|s| match s {
                Shape::Null | Shape::Nullable(_) => s,
                other => Shape::Nullable(Box::new(other)),
            }),
        ]
    })
}

/// Avro schema JSON for a shape; named types get unique names.
fn schema_json(shape: &Shape, names: &mut usize) -> Value {
    match shape {
        Shape::Null => json!("null"),
        Shape::Boolean => json!("boolean"),
        Shape::Int => json!("int"),
        Shape::Long => json!("long"),
        Shape::Float => json!("float"),
        Shape::Double => json!("double"),
        Shape::Bytes => json!("bytes"),
        Shape::Str => json!("string"),
        Shape::Fixed(size) => json!({"type": "fixed", "name": fresh("F", names), "size": size}),
        Shape::Array(items) => json!({"type": "array", "items": schema_json(items, names)}),
        Shape::Map(values) => json!({"type": "map", "values": schema_json(values, names)}),
        Shape::Record(fields) => {
            let name = fresh("R", names);
            let fields: Vec<Value> = fields
                .iter()
                .enumerate()
                .map(|(i, f)| json!({"name": format!("f{i}"), "type": schema_json(f, names)}))
                .collect();
            json!({"type": "record", "name": name, "fields": fields})
        }
        Shape::Nullable(inner) => json!(["null", schema_json(inner, names)]),
    }
}

fn fresh(prefix: &str, names: &mut usize) -> String {
    *names += 1;
    format!("{prefix}{names}")
}

fn conforming(shape: &Shape) -> BoxedStrategy<Value> {
    match shape {
        Shape::Null => Just(Value::Null).boxed(),
        Shape::Boolean => any::<bool>().prop_map(Value::Bool).boxed(),
        Shape::Int => any::<i32>().prop_map(|i| json!(i)).boxed(),
        Shape::Long => any::<i64>().prop_map(|i| json!(i)).boxed(),
        Shape::Float => (-1.0e6f64..1.0e6).prop_map(|f| json!(f)).boxed(),
        Shape::Double => (-1.0e12f64..1.0e12).prop_map(|f| json!(f)).boxed(),
        Shape::Bytes | Shape::Str => "[a-z0-9 ]{0,12}".prop_map(Value::String).boxed(),
        Shape::Fixed(size) => proptest::string::string_regex(&format!("[a-z]{{{size}}}"))
            .expect("valid fixed pattern")
            .prop_map(Value::String)
            .boxed(),
        Shape::Array(items) => vec(conforming(items), 0..4).prop_map(Value::Array).boxed(),
        Shape::Map(values) => btree_map("[a-z]{1,4}", conforming(values), 0..4)
            .prop_map(|m| Value::Object(m.into_iter().collect()))
            .boxed(),
        Shape::Record(fields) => {
            let fields: Vec<BoxedStrategy<Value>> = fields.iter().map(conforming).collect();
            fields
                .prop_map(|values| {
                    // reverse key order: output order must come from the schema
                    let mut object = Map::new();
                    for (i, v) in values.into_iter().enumerate().rev() {
                        object.insert(format!("f{i}"), v);
                    }
                    Value::Object(object)
                })
                .boxed()
        }
        Shape::Nullable(inner) => prop_oneof![Just(Value::Null), conforming(inner)].boxed(),
    }
}

fn case() -> impl Strategy<Value = (String, Value)> {
    shape().prop_flat_map(|shape| {
        let schema = schema_json(&shape, &mut 0).to_string();
        conforming(&shape).prop_map(move |json| (schema.clone(), json))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn conforming_values_map_and_encode((schema_text, json) in case()) {
        let schema = Schema::parse_str(&schema_text).unwrap();
        let avro_schema = apache_avro::Schema::parse_str(&schema_text).unwrap();

        let datum = Mapper::new(&schema, MapOptions::default()).map_document(&json);
        prop_assert!(datum.is_ok(), "{schema_text} rejected {json}: {:?}", datum.err());

        let mut sink = AvroSink::new(&avro_schema, Vec::new(), CodecChoice::Null, DEFAULT_BLOCK_SIZE).unwrap();
        let appended = sink.append(datum.unwrap());
        prop_assert!(appended.is_ok(), "{schema_text} failed to encode {json}: {:?}", appended.err());
        let bytes = sink.finish().unwrap();
        prop_assert_eq!(apache_avro::Reader::new(&bytes[..]).unwrap().count(), 1);
    }

    #[test]
    fn boolean_field_rejects_every_other_json_kind(json in prop_oneof![
        Just(Value::Null),
        any::<i64>().prop_map(|i| json!(i)),
        "[a-z]{0,5}".prop_map(Value::String),
        Just(json!([true])),
        Just(json!({"f": true})),
    ]) {
        let schema = Schema::parse_value(&json!({
            "type": "record", "name": "R", "fields": [{"name": "f", "type": "boolean"}]
        })).unwrap();
        let err = Mapper::new(&schema, MapOptions::default()).map_document(&json!({"f": json}));
        prop_assert_eq!(err.map_err(|e| e.kind()), Err(MapErrorKind::TypeMismatch));
    }
}
