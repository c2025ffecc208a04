//! Schema-driven JSON → [`Datum`] mapping.
//!
//! One recursive walk dispatched on the schema node:
//! - The effective input is the JSON value if present, else the field default;
//!   with neither the node fails with [`MapError::SchemaMismatch`].
//! - Records follow the schema's field order, never the JSON key order.
//! - Unions probe branches in declared order in lenient mode and take the
//!   first that maps. No backtracking once a branch is chosen.
//! - Ints want JSON integers, floats want JSON reals; the two never cross.
//! - Enum values are not validated; the first symbol is written.
//! - Named-type back-references ([`Schema::Link`]) are unsupported.
//!
//! A failure site emits one `warn` diagnostic unless it runs in lenient mode;
//! the error itself always propagates.
pub mod str;
pub mod num;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::datum::Datum;
use crate::schema::{FixedSchema, RecordSchema, Schema};

pub use num::Integer;

// ------------------------------- Types ----------------------------------- //

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapOptions {
    /// Byte ceiling for strings; `0` disables truncation.
    pub max_string_size: usize,
    /// Serialize non-string JSON into string fields instead of failing.
    pub dump_unmatched_as_string: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapErrorKind {
    TypeMismatch,
    SchemaMismatch,
    NoUnionBranchMatched,
    UnsupportedFeature,
    EncodingFailure,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError {
    #[error("expecting JSON {expected} for Avro {schema} at {path}, got {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        schema: &'static str,
        found: &'static str,
    },
    #[error("Avro schema requires a value at {path}, JSON has none and there is no default")]
    SchemaMismatch { path: String },
    #[error("no type in the Avro union at {path} matched JSON {found}")]
    NoUnionBranchMatched { path: String, found: &'static str },
    #[error("{feature} is not supported (at {path})")]
    UnsupportedFeature { path: String, feature: String },
    #[error("cannot encode value at {path}: {reason}")]
    EncodingFailure { path: String, reason: String },
}

impl MapError {
    pub fn kind(&self) -> MapErrorKind {
        match self {
            MapError::TypeMismatch { .. } => MapErrorKind::TypeMismatch,
            MapError::SchemaMismatch { .. } => MapErrorKind::SchemaMismatch,
            MapError::NoUnionBranchMatched { .. } => MapErrorKind::NoUnionBranchMatched,
            MapError::UnsupportedFeature { .. } => MapErrorKind::UnsupportedFeature,
            MapError::EncodingFailure { .. } => MapErrorKind::EncodingFailure,
        }
    }

    /// JSON path at which mapping failed, e.g. `$.user.tags[2]`.
    pub fn path(&self) -> &str {
        match self {
            MapError::TypeMismatch { path, .. }
            | MapError::SchemaMismatch { path }
            | MapError::NoUnionBranchMatched { path, .. }
            | MapError::UnsupportedFeature { path, .. }
            | MapError::EncodingFailure { path, .. } => path,
        }
    }
}

/// Maps whole documents against a root schema.
#[derive(Debug, Clone, Copy)]
pub struct Mapper<'s> {
    schema: &'s Schema,
    options: MapOptions,
}

impl<'s> Mapper<'s> {
    pub fn new(schema: &'s Schema, options: MapOptions) -> Self {
        Self { schema, options }
    }

    pub fn map_document(&self, json: &Value) -> Result<Datum, MapError> {
        map_value(self.schema, Some(json), None, false, &self.options)
    }
}

/// Map `json` (or, when absent, `default`) against `schema`.
pub fn map_value(
    schema: &Schema,
    json: Option<&Value>,
    default: Option<&Value>,
    lenient: bool,
    options: &MapOptions,
) -> Result<Datum, MapError> {
    Walker { options, path: Vec::new() }.walk(schema, json, default, lenient)
}

// ------------------------------- Walker ---------------------------------- //

enum Segment<'j> {
    Field(&'j str),
    Index(usize),
    Key(&'j str),
}

struct Walker<'o, 'j> {
    options: &'o MapOptions,
    path: Vec<Segment<'j>>,
}

impl<'j> Walker<'_, 'j> {
    fn walk(
        &mut self,
        schema: &'j Schema,
        json: Option<&'j Value>,
        default: Option<&'j Value>,
        lenient: bool,
    ) -> Result<Datum, MapError> {
        let Some(json) = json.or(default) else {
            let err = MapError::SchemaMismatch { path: self.path() };
            return Err(self.fail(err, lenient));
        };

        match schema {
            Schema::Record(record) => self.record(record, json, lenient),
            Schema::Union(branches) => self.union(branches, json, lenient),
            Schema::Array(items) => {
                let Value::Array(xs) = json else {
                    return Err(self.mismatch("array", schema.kind(), json, lenient));
                };
                let mut out = Vec::with_capacity(xs.len());
                for (i, x) in xs.iter().enumerate() {
                    out.push(self.within(Segment::Index(i), |w| w.walk(items, Some(x), None, lenient))?);
                }
                Ok(Datum::Array(out))
            }
            Schema::Map(values) => {
                let Value::Object(object) = json else {
                    return Err(self.mismatch("object", schema.kind(), json, lenient));
                };
                let mut out = IndexMap::with_capacity(object.len());
                for (k, v) in object {
                    let datum = self.within(Segment::Key(k), |w| w.walk(values, Some(v), None, lenient))?;
                    out.insert(k.clone(), datum);
                }
                Ok(Datum::Map(out))
            }
            Schema::String => self.string(json, lenient),
            Schema::Bytes => match json {
                Value::String(s) => Ok(Datum::Bytes(str::bytes_payload(s))),
                _ => Err(self.mismatch("string", schema.kind(), json, lenient)),
            },
            Schema::Fixed(fixed) => self.fixed(fixed, json, lenient),
            Schema::Int => match num::integer(json) {
                // no range check: wraps to 32 bits
                Some(Integer::Fits(i)) => Ok(Datum::Int(i as i32)),
                Some(Integer::Overflow(u)) => Err(self.overflow(u, schema, lenient)),
                None => Err(self.mismatch("integer", schema.kind(), json, lenient)),
            },
            Schema::Long => match num::integer(json) {
                Some(Integer::Fits(i)) => Ok(Datum::Long(i)),
                Some(Integer::Overflow(u)) => Err(self.overflow(u, schema, lenient)),
                None => Err(self.mismatch("integer", schema.kind(), json, lenient)),
            },
            Schema::Float => match num::real(json) {
                Some(f) => Ok(Datum::Float(f as f32)),
                None => Err(self.mismatch("real", schema.kind(), json, lenient)),
            },
            Schema::Double => match num::real(json) {
                Some(f) => Ok(Datum::Double(f)),
                None => Err(self.mismatch("real", schema.kind(), json, lenient)),
            },
            Schema::Boolean => match json {
                Value::Bool(b) => Ok(Datum::Boolean(*b)),
                _ => Err(self.mismatch("boolean", schema.kind(), json, lenient)),
            },
            Schema::Null => match json {
                Value::Null => Ok(Datum::Null),
                _ => Err(self.mismatch("null", schema.kind(), json, lenient)),
            },
            // TODO: validate the JSON string against `symbols`
            Schema::Enum(e) => match e.symbols.first() {
                Some(symbol) => Ok(Datum::Enum { index: 0, symbol: symbol.clone() }),
                None => {
                    let reason = format!("enum `{}` declares no symbols", e.name);
                    Err(self.fail(MapError::EncodingFailure { path: self.path(), reason }, lenient))
                }
            },
            Schema::Link(name) => {
                let feature = format!("named type reference `{name}`");
                Err(self.fail(MapError::UnsupportedFeature { path: self.path(), feature }, lenient))
            }
        }
    }

    fn record(&mut self, record: &'j RecordSchema, json: &'j Value, lenient: bool) -> Result<Datum, MapError> {
        let Value::Object(object) = json else {
            return Err(self.mismatch("object", "record", json, lenient));
        };
        let mut out = IndexMap::with_capacity(record.fields.len());
        for field in &record.fields {
            let datum = self.within(Segment::Field(&field.name), |w| {
                w.walk(&field.schema, object.get(&field.name), field.default.as_ref(), lenient)
            })?;
            out.insert(field.name.clone(), datum);
        }
        Ok(Datum::Record(out))
    }

    fn union(&mut self, branches: &'j [Schema], json: &'j Value, lenient: bool) -> Result<Datum, MapError> {
        for (i, branch) in branches.iter().enumerate() {
            if let Ok(datum) = self.walk(branch, Some(json), None, true) {
                return Ok(Datum::union(i, datum));
            }
        }
        let err = MapError::NoUnionBranchMatched { path: self.path(), found: json_kind(json) };
        Err(self.fail(err, lenient))
    }

    fn string(&mut self, json: &'j Value, lenient: bool) -> Result<Datum, MapError> {
        let max = self.options.max_string_size;
        match json {
            Value::String(s) => Ok(Datum::String(str::truncate(s.clone(), max))),
            // kept as its JSON text, which truncation may cut mid-document
            other if self.options.dump_unmatched_as_string => {
                Ok(Datum::String(str::truncate(str::dump_sorted(other), max)))
            }
            other => Err(self.mismatch("string", "string", other, lenient)),
        }
    }

    fn fixed(&mut self, fixed: &FixedSchema, json: &Value, lenient: bool) -> Result<Datum, MapError> {
        let Value::String(s) = json else {
            return Err(self.mismatch("string", "fixed", json, lenient));
        };
        let bytes = str::bytes_payload(s);
        if bytes.len() != fixed.size {
            let reason = format!(
                "fixed `{}` holds {} bytes, JSON string has {}",
                fixed.name,
                fixed.size,
                bytes.len()
            );
            return Err(self.fail(MapError::EncodingFailure { path: self.path(), reason }, lenient));
        }
        Ok(Datum::Fixed(bytes))
    }

    // ---------------------------- helpers -------------------------------- //

    fn within<T>(&mut self, segment: Segment<'j>, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push(segment);
        let out = f(self);
        self.path.pop();
        out
    }

    fn mismatch(&self, expected: &'static str, schema: &'static str, json: &Value, lenient: bool) -> MapError {
        let err = MapError::TypeMismatch {
            path: self.path(),
            expected,
            schema,
            found: json_kind(json),
        };
        self.fail(err, lenient)
    }

    fn overflow(&self, value: u64, schema: &Schema, lenient: bool) -> MapError {
        let reason = format!("integer {value} does not fit Avro {}", schema.kind());
        self.fail(MapError::EncodingFailure { path: self.path(), reason }, lenient)
    }

    fn fail(&self, err: MapError, lenient: bool) -> MapError {
        if !lenient {
            tracing::warn!("{err}");
        }
        err
    }

    fn path(&self) -> String {
        let mut out = String::from("$");
        for segment in &self.path {
            match segment {
                Segment::Field(name) => {
                    out.push('.');
                    out.push_str(name);
                }
                Segment::Index(i) => out.push_str(&format!("[{i}]")),
                Segment::Key(k) => out.push_str(&format!("[{k:?}]")),
            }
        }
        out
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "real",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
