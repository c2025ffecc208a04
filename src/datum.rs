// Schema-conformant output values. No serde_json::Value here.

use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
    Fixed(Vec<u8>),
    Enum { index: u32, symbol: String },
    Union { branch: u32, value: Box<Datum> },
    Array(Vec<Datum>),
    Map(IndexMap<String, Datum>),
    Record(IndexMap<String, Datum>), // schema declaration order
}

impl Datum {
    pub fn union(branch: usize, value: Datum) -> Self {
        Datum::Union { branch: branch as u32, value: Box::new(value) }
    }

    /// Record field by name.
    pub fn field(&self, name: &str) -> Option<&Datum> {
        match self {
            Datum::Record(fields) => fields.get(name),
            _ => None,
        }
    }
}
