//! Avro schema JSON → [`Schema`].
//!
//! Errors carry the JSON path of the offending schema node, e.g.
//! `$.fields[2].type`.
use std::collections::HashSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use super::{EnumSchema, Field, FixedSchema, Name, RecordSchema, Schema};

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("name pattern is a valid regex")
});

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("schema is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("at schema path {path} → {reason}")]
    Invalid { path: String, reason: String },
}

pub fn parse_str(src: &str) -> Result<Schema, SchemaError> {
    let value = serde_json::from_str::<Value>(src)?;
    parse_value(&value)
}

pub fn parse_value(value: &Value) -> Result<Schema, SchemaError> {
    Parser::default().parse(value, None)
}

// ------------------------------- Parser ---------------------------------- //

#[derive(Default)]
struct Parser {
    /// Full names defined so far, in document order.
    defined: HashSet<String>,
    path: Vec<String>,
}

impl Parser {
    fn parse(&mut self, value: &Value, ns: Option<&str>) -> Result<Schema, SchemaError> {
        match value {
            Value::String(s) => self.parse_name_ref(s, ns),
            Value::Array(branches) => self.parse_union(branches, ns),
            Value::Object(map) => self.parse_complex(map, ns),
            other => Err(self.error(format!("expected a type name, union or object, got {}", json_kind(other)))),
        }
    }

    fn parse_name_ref(&mut self, s: &str, ns: Option<&str>) -> Result<Schema, SchemaError> {
        if let Some(primitive) = primitive(s) {
            return Ok(primitive);
        }
        let name = split_name(s, ns);
        let fullname = name.fullname();
        if self.defined.contains(&fullname) {
            return Ok(Schema::Link(name));
        }
        // unqualified names may also refer to the null namespace
        if !s.contains('.') && self.defined.contains(s) {
            return Ok(Schema::Link(Name::new(s, None)));
        }
        Err(self.error(format!("unknown type `{s}`")))
    }

    fn parse_union(&mut self, branches: &[Value], ns: Option<&str>) -> Result<Schema, SchemaError> {
        let mut out = Vec::with_capacity(branches.len());
        let mut seen = HashSet::new();
        for (i, branch) in branches.iter().enumerate() {
            let schema = self.at(format!("[{i}]"), |p| p.parse(branch, ns))?;
            if matches!(schema, Schema::Union(_)) {
                return Err(self.error("unions may not immediately contain other unions"));
            }
            let key = match schema.name() {
                Some(name) => name.fullname(),
                None => schema.kind().to_string(),
            };
            if !seen.insert(key.clone()) {
                return Err(self.error(format!("duplicate `{key}` in union")));
            }
            out.push(schema);
        }
        Ok(Schema::Union(out))
    }

    fn parse_complex(&mut self, map: &Map<String, Value>, ns: Option<&str>) -> Result<Schema, SchemaError> {
        let Some(ty) = map.get("type") else {
            return Err(self.error("missing `type` attribute"));
        };
        match ty {
            Value::String(t) => match t.as_str() {
                "record" | "error" => self.parse_record(map, ns),
                "enum" => self.parse_enum(map, ns),
                "fixed" => self.parse_fixed(map, ns),
                "array" => {
                    let items = self.required(map, "items")?;
                    let items = self.at(".items", |p| p.parse(items, ns))?;
                    Ok(Schema::Array(Box::new(items)))
                }
                "map" => {
                    let values = self.required(map, "values")?;
                    let values = self.at(".values", |p| p.parse(values, ns))?;
                    Ok(Schema::Map(Box::new(values)))
                }
                // primitive with attributes (logicalType etc.) or a named reference
                _ => self.at(".type", |p| p.parse(ty, ns)),
            },
            Value::Object(_) | Value::Array(_) => self.at(".type", |p| p.parse(ty, ns)),
            other => Err(self.error(format!("`type` must be a string, object or array, got {}", json_kind(other)))),
        }
    }

    fn parse_record(&mut self, map: &Map<String, Value>, ns: Option<&str>) -> Result<Schema, SchemaError> {
        let name = self.define_name(map, ns)?;
        let Some(fields) = self.required(map, "fields")?.as_array() else {
            return Err(self.error("`fields` must be an array"));
        };

        let field_ns = name.namespace.clone();
        let mut out: Vec<Field> = Vec::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            let field = self.at(format!(".fields[{i}]"), |p| p.parse_field(field, field_ns.as_deref()))?;
            if out.iter().any(|f| f.name == field.name) {
                return Err(self.error(format!("duplicate field `{}`", field.name)));
            }
            out.push(field);
        }
        Ok(Schema::Record(RecordSchema { name, fields: out }))
    }

    fn parse_field(&mut self, value: &Value, ns: Option<&str>) -> Result<Field, SchemaError> {
        let Some(map) = value.as_object() else {
            return Err(self.error("field must be an object"));
        };
        let name = self.required_str(map, "name")?.to_owned();
        if !NAME_RE.is_match(&name) {
            return Err(self.error(format!("invalid field name `{name}`")));
        }
        let ty = self.required(map, "type")?;
        let schema = self.at(".type", |p| p.parse(ty, ns))?;
        Ok(Field { name, schema, default: map.get("default").cloned() })
    }

    fn parse_enum(&mut self, map: &Map<String, Value>, ns: Option<&str>) -> Result<Schema, SchemaError> {
        let name = self.define_name(map, ns)?;
        let Some(raw) = self.required(map, "symbols")?.as_array() else {
            return Err(self.error("`symbols` must be an array"));
        };
        let mut symbols: Vec<String> = Vec::with_capacity(raw.len());
        for symbol in raw {
            let Some(symbol) = symbol.as_str() else {
                return Err(self.error("enum symbols must be strings"));
            };
            if !NAME_RE.is_match(symbol) {
                return Err(self.error(format!("invalid enum symbol `{symbol}`")));
            }
            if symbols.iter().any(|s| s == symbol) {
                return Err(self.error(format!("duplicate enum symbol `{symbol}`")));
            }
            symbols.push(symbol.to_owned());
        }
        match map.get("default") {
            None => {}
            Some(Value::String(d)) if symbols.contains(d) => {}
            Some(other) => return Err(self.error(format!("enum default {other} is not one of the symbols"))),
        }
        Ok(Schema::Enum(EnumSchema { name, symbols }))
    }

    fn parse_fixed(&mut self, map: &Map<String, Value>, ns: Option<&str>) -> Result<Schema, SchemaError> {
        let name = self.define_name(map, ns)?;
        let Some(size) = self.required(map, "size")?.as_u64() else {
            return Err(self.error("`size` must be a non-negative integer"));
        };
        let Ok(size) = usize::try_from(size) else {
            return Err(self.error(format!("fixed size {size} is too large")));
        };
        Ok(Schema::Fixed(FixedSchema { name, size }))
    }

    // ---------------------------- helpers -------------------------------- //

    /// Resolve a named type's name against the enclosing namespace and register it.
    fn define_name(&mut self, map: &Map<String, Value>, ns: Option<&str>) -> Result<Name, SchemaError> {
        let raw = self.required_str(map, "name")?;
        let name = if raw.contains('.') {
            split_name(raw, None)
        } else {
            let own_ns = map.get("namespace").and_then(Value::as_str).or(ns);
            Name::new(raw, own_ns.map(str::to_owned))
        };

        let valid = NAME_RE.is_match(&name.name)
            && name.namespace.as_deref().is_none_or(|ns| ns.split('.').all(|part| NAME_RE.is_match(part)));
        if !valid {
            return Err(self.error(format!("invalid name `{}`", name.fullname())));
        }
        if !self.defined.insert(name.fullname()) {
            return Err(self.error(format!("named type `{}` is defined more than once", name.fullname())));
        }
        Ok(name)
    }

    fn required<'v>(&self, map: &'v Map<String, Value>, key: &str) -> Result<&'v Value, SchemaError> {
        map.get(key).ok_or_else(|| self.error(format!("missing `{key}` attribute")))
    }

    fn required_str<'v>(&self, map: &'v Map<String, Value>, key: &str) -> Result<&'v str, SchemaError> {
        self.required(map, key)?
            .as_str()
            .ok_or_else(|| self.error(format!("`{key}` must be a string")))
    }

    fn at<T>(
        &mut self,
        segment: impl Into<String>,
        f: impl FnOnce(&mut Self) -> Result<T, SchemaError>,
    ) -> Result<T, SchemaError> {
        self.path.push(segment.into());
        let out = f(self);
        self.path.pop();
        out
    }

    fn error(&self, reason: impl Into<String>) -> SchemaError {
        SchemaError::Invalid { path: format!("${}", self.path.concat()), reason: reason.into() }
    }
}

fn primitive(s: &str) -> Option<Schema> {
    Some(match s {
        "null" => Schema::Null,
        "boolean" => Schema::Boolean,
        "int" => Schema::Int,
        "long" => Schema::Long,
        "float" => Schema::Float,
        "double" => Schema::Double,
        "bytes" => Schema::Bytes,
        "string" => Schema::String,
        _ => return None,
    })
}

fn split_name(s: &str, ns: Option<&str>) -> Name {
    match s.rsplit_once('.') {
        Some((namespace, name)) => Name::new(name, Some(namespace.to_owned())),
        None => Name::new(s, ns.map(str::to_owned)),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
