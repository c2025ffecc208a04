//! Avro schema model.
//!
//! A closed sum type over the Avro type system, parsed once from schema JSON
//! and shared read-only by every record conversion. Named types are expanded
//! at their point of definition; later references to a name become
//! [`Schema::Link`], which the mapper refuses (no recursive schemas).
pub mod parse;

use std::fmt;
use serde_json::Value;

pub use parse::SchemaError;

// ------------------------------- Types ----------------------------------- //

#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Array(Box<Schema>),
    Map(Box<Schema>),
    Union(Vec<Schema>),
    Record(RecordSchema),
    Enum(EnumSchema),
    Fixed(FixedSchema),
    /// Back-reference to an already defined named type.
    Link(Name),
}

/// Fully qualified Avro name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    pub name: String,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: Name,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    /// Kept verbatim; `Some(Value::Null)` is a real default, distinct from `None`.
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub name: Name,
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixedSchema {
    pub name: Name,
    pub size: usize,
}

// ---------------------------- Implementation ----------------------------- //

impl Schema {
    pub fn parse_str(src: &str) -> Result<Self, SchemaError> {
        parse::parse_str(src)
    }

    pub fn parse_value(value: &Value) -> Result<Self, SchemaError> {
        parse::parse_value(value)
    }

    /// Avro spelling of this node's type, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Schema::Null => "null",
            Schema::Boolean => "boolean",
            Schema::Int => "int",
            Schema::Long => "long",
            Schema::Float => "float",
            Schema::Double => "double",
            Schema::Bytes => "bytes",
            Schema::String => "string",
            Schema::Array(_) => "array",
            Schema::Map(_) => "map",
            Schema::Union(_) => "union",
            Schema::Record(_) => "record",
            Schema::Enum(_) => "enum",
            Schema::Fixed(_) => "fixed",
            Schema::Link(_) => "link",
        }
    }

    /// Name of a named type (record, enum, fixed) or link target.
    pub fn name(&self) -> Option<&Name> {
        match self {
            Schema::Record(r) => Some(&r.name),
            Schema::Enum(e) => Some(&e.name),
            Schema::Fixed(f) => Some(&f.name),
            Schema::Link(n) => Some(n),
            _ => None,
        }
    }
}

impl Name {
    pub fn new(name: impl Into<String>, namespace: Option<String>) -> Self {
        Self { name: name.into(), namespace: namespace.filter(|ns| !ns.is_empty()) }
    }

    pub fn fullname(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fullname())
    }
}
