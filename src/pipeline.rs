//! Record pipeline: source → mapper → sink, one document at a time.
//!
//! Two states, `Reading` and `Done`. Per step:
//! - well-formed document: map it; write on success, count and skip on a
//!   mapping failure. A sink failure is fatal.
//! - malformed document: abort, or skip to the next line and go on, per
//!   [`MalformedPolicy`].
//! - end of input: `Done`.
use std::io;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info_span, warn};

use crate::mapper::Mapper;
use crate::memstat::MemoryStatus;
use crate::sink::{RecordSink, SinkError};
use crate::source::{Document, DocumentSource, ParseFailure};

/// Progress interval used by the command line.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1000;

// ------------------------------- Types ----------------------------------- //

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Log, discard through the end of the line, continue.
    #[default]
    Skip,
    /// Stop the run with [`PipelineError::MalformedInput`].
    Abort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    pub on_malformed: MalformedPolicy,
    /// Documents between progress lines and memory samples; `None` for no
    /// periodic reports.
    pub progress_interval: Option<u64>,
    /// Sample memory at every progress interval and once at the end.
    pub memory_stats: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Reading,
    Done,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Documents seen, malformed ones included.
    pub documents: u64,
    pub written: u64,
    pub malformed: u64,
    pub mismatched: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryStatus>,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("JSON error in record {record} on {failure}, aborting")]
    MalformedInput { record: u64, failure: ParseFailure },
    #[error("writing record {record} failed: {source}")]
    Write {
        record: u64,
        #[source]
        source: SinkError,
    },
    #[error("reading input failed: {0}")]
    Io(#[from] io::Error),
}

pub struct Pipeline<'m, S, K> {
    source: S,
    mapper: Mapper<'m>,
    sink: K,
    options: PipelineOptions,
    state: State,
    summary: RunSummary,
}

// ---------------------------- Implementation ----------------------------- //

impl<'m, S: DocumentSource, K: RecordSink> Pipeline<'m, S, K> {
    pub fn new(source: S, mapper: Mapper<'m>, sink: K, options: PipelineOptions) -> Self {
        Self { source, mapper, sink, options, state: State::Reading, summary: RunSummary::default() }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Give the sink back, e.g. to finalize the container after an abort.
    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Drive until `Done`.
    pub fn run(&mut self) -> Result<RunSummary, PipelineError> {
        while self.step()? == State::Reading {}
        Ok(self.summary.clone())
    }

    /// Process one document.
    pub fn step(&mut self) -> Result<State, PipelineError> {
        if self.state == State::Done {
            return Ok(State::Done);
        }
        let result = self.advance();
        if result.is_err() {
            self.state = State::Done;
        }
        result
    }

    fn advance(&mut self) -> Result<State, PipelineError> {
        let Some(document) = self.source.next_document()? else {
            self.state = State::Done;
            if self.options.memory_stats {
                self.sample_memory();
            }
            return Ok(State::Done);
        };

        self.summary.documents += 1;
        let n = self.summary.documents;
        let span = info_span!("record", n);
        let _entered = span.enter();

        let periodic = self.options.progress_interval.is_some_and(|every| every > 0 && n % every == 0);
        if periodic {
            debug!("processing record {n}");
        }

        match document {
            Document::Malformed(failure) => {
                self.summary.malformed += 1;
                match self.options.on_malformed {
                    MalformedPolicy::Abort => {
                        return Err(PipelineError::MalformedInput { record: n, failure });
                    }
                    MalformedPolicy::Skip => {
                        warn!("JSON error on {failure}, skipping to end of line");
                        self.source.skip_to_boundary()?;
                    }
                }
            }
            Document::Parsed(json) => match self.mapper.map_document(&json) {
                Ok(record) => {
                    self.sink
                        .append(record)
                        .map_err(|source| PipelineError::Write { record: n, source })?;
                    self.summary.written += 1;
                }
                Err(e) => {
                    // the mapper already logged the mismatch
                    self.summary.mismatched += 1;
                    debug!(kind = ?e.kind(), "skipping record");
                }
            },
        }

        if periodic && self.options.memory_stats {
            self.sample_memory();
        }
        Ok(State::Reading)
    }

    fn sample_memory(&mut self) {
        MemoryStatus::report();
        self.summary.memory = MemoryStatus::sample().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::Datum;
    use crate::mapper::MapOptions;
    use crate::schema::Schema;
    use crate::source::JsonStream;

    #[derive(Default)]
    struct Collect(Vec<Datum>);

    impl RecordSink for Collect {
        fn append(&mut self, record: Datum) -> Result<(), SinkError> {
            self.0.push(record);
            Ok(())
        }
    }

    #[test]
    fn steps_through_states() {
        let schema = Schema::Array(Box::new(Schema::Long));
        let mapper = Mapper::new(&schema, MapOptions::default());
        let source = JsonStream::new("[1] [2]".as_bytes());
        let mut pipeline = Pipeline::new(source, mapper, Collect::default(), PipelineOptions::default());

        assert_eq!(pipeline.state(), State::Reading);
        assert_eq!(pipeline.step().unwrap(), State::Reading);
        assert_eq!(pipeline.step().unwrap(), State::Reading);
        assert_eq!(pipeline.step().unwrap(), State::Done);
        assert_eq!(pipeline.step().unwrap(), State::Done);
        assert_eq!(pipeline.summary().written, 2);
        assert_eq!(
            pipeline.into_sink().0,
            vec![Datum::Array(vec![Datum::Long(1)]), Datum::Array(vec![Datum::Long(2)])]
        );
    }

    #[test]
    fn summary_serializes_without_memory_when_unsampled() {
        let summary = RunSummary { documents: 3, written: 2, malformed: 1, mismatched: 0, memory: None };
        assert_eq!(
            serde_json::to_string(&summary).unwrap(),
            r#"{"documents":3,"written":2,"malformed":1,"mismatched":0}"#
        );
    }
}
