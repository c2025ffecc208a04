//! json2avro: convert a stream of JSON documents into an Avro object
//! container file, one record per document.
//!
//! Pipeline: `source` (JSON documents) → `mapper` (schema-driven coercion
//! into a [`datum::Datum`]) → `sink` (Avro container writer).
pub mod schema;
pub mod datum;
pub mod lower;
pub mod mapper;
pub mod source;
pub mod sink;
pub mod pipeline;
pub mod memstat;
pub mod cli;

pub use datum::Datum;
pub use mapper::{map_value, MapError, MapErrorKind, MapOptions, Mapper};
pub use pipeline::{MalformedPolicy, Pipeline, PipelineError, PipelineOptions, RunSummary, State};
pub use schema::Schema;
pub use sink::{AvroSink, CodecChoice, RecordSink, SinkError};
pub use source::{Document, DocumentSource, JsonStream, ParseFailure};
