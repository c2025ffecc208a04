//! Record sinks.
//!
//! [`AvroSink`] appends mapped records to an Avro object container file.
//! The writer validates each value against its own parse of the schema, so a
//! record the mapper accepted can still be rejected here; the pipeline treats
//! that as fatal.
use std::io::{self, Write};
use std::str::FromStr;
use apache_avro::{Codec, Schema as AvroSchema, Writer};
use thiserror::Error;

use crate::datum::Datum;
use crate::lower::to_avro;

pub const DEFAULT_BLOCK_SIZE: usize = 16 * 1024;

// ------------------------------- Types ----------------------------------- //

/// Where mapped records go.
pub trait RecordSink {
    fn append(&mut self, record: Datum) -> Result<(), SinkError>;
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("avro writer failed: {0}")]
    Avro(#[from] apache_avro::Error),
    #[error("invalid codec `{0}`, valid codecs: null, snappy, deflate, lzma")]
    InvalidCodec(String),
    #[error("writing output failed: {0}")]
    Io(#[from] io::Error),
}

/// Output compression, by the names the CLI accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum CodecChoice {
    #[default]
    Null,
    Snappy,
    Deflate,
    /// Avro's `xz` codec.
    Lzma,
}

pub struct AvroSink<'a, W: Write> {
    writer: Writer<'a, W>,
}

// ---------------------------- Implementation ----------------------------- //

impl CodecChoice {
    pub fn name(self) -> &'static str {
        match self {
            CodecChoice::Null => "null",
            CodecChoice::Snappy => "snappy",
            CodecChoice::Deflate => "deflate",
            CodecChoice::Lzma => "lzma",
        }
    }

    pub fn to_codec(self) -> Result<Codec, SinkError> {
        let avro_name = match self {
            CodecChoice::Lzma => "xz",
            other => other.name(),
        };
        Codec::from_str(avro_name).map_err(|_| SinkError::InvalidCodec(self.name().to_string()))
    }
}

impl<'a, W: Write> AvroSink<'a, W> {
    pub fn new(
        schema: &'a AvroSchema,
        out: W,
        codec: CodecChoice,
        block_size: usize,
    ) -> Result<Self, SinkError> {
        let writer = Writer::builder()
            .schema(schema)
            .writer(out)
            .codec(codec.to_codec()?)
            .block_size(block_size)
            .build();
        Ok(Self { writer })
    }

    /// Flush the last block and the output, and hand the output back. The
    /// header is written even when no record was appended.
    pub fn finish(self) -> Result<W, SinkError> {
        let mut out = self.writer.into_inner()?;
        out.flush()?;
        Ok(out)
    }
}

impl<W: Write> RecordSink for AvroSink<'_, W> {
    fn append(&mut self, record: Datum) -> Result<(), SinkError> {
        self.writer.append(to_avro(record))?;
        Ok(())
    }
}
