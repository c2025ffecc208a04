//! CLI: JSON documents → Avro object container file.
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::mapper::{MapOptions, Mapper};
use crate::pipeline::{
    MalformedPolicy, Pipeline, PipelineError, PipelineOptions, RunSummary, DEFAULT_PROGRESS_INTERVAL,
};
use crate::memstat::MemoryStatus;
use crate::schema::{Schema, SchemaError};
use crate::sink::{AvroSink, CodecChoice, SinkError, DEFAULT_BLOCK_SIZE};
use crate::source::JsonStream;

/// Largest schema file we agree to load.
pub const MAX_SCHEMA_LEN: u64 = 1024 * 1024;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// convert whitespace-separated JSON documents into an Avro object container file
///
/// If INPUT is omitted, STDIN is read. An OUTPUT of '-' means STDOUT.
#[derive(Parser, Debug)]
#[command(name = "json2avro", version, about)]
#[command(group(ArgGroup::new("schema_source").required(true).args(["schema", "schema_file"])))]
pub struct CommandLineInterface {
    /// Avro schema to use for conversion (inline JSON)
    #[arg(short = 's', long)]
    schema: Option<String>,

    /// JSON file to read the Avro schema from
    #[arg(short = 'S', long, value_name = "FILE")]
    schema_file: Option<PathBuf>,

    /// output compression codec
    #[arg(short = 'c', long, value_enum, default_value_t = CodecChoice::Null)]
    codec: CodecChoice,

    /// output block size in bytes (0 = default)
    #[arg(short = 'b', long, value_name = "BYTES", default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// debug mode: progress lines and debug logging
    #[arg(short = 'd', long)]
    debug: bool,

    /// dump JSON values that don't match a string field as JSON text
    #[arg(short = 'j', long)]
    dump_json: bool,

    /// abort on JSON parsing errors (default: skip invalid JSON)
    #[arg(short = 'x', long)]
    abort_on_error: bool,

    /// maximum string size in bytes (0 = no limit)
    #[arg(short = 'z', long, value_name = "BYTES", default_value_t = 0)]
    max_string_size: usize,

    /// Linux only: periodic memory statistics
    #[arg(short = 'm', long)]
    memstat: bool,

    /// [INPUT] OUTPUT
    #[arg(value_name = "FILES", num_args = 1..=2, required = true)]
    files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Stdout,
    Path(PathBuf),
}

/// Everything a run needs, resolved from the flags.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub schema_text: String,
    pub input: Input,
    pub output: Output,
    pub codec: CodecChoice,
    pub block_size: usize,
    pub map_options: MapOptions,
    pub pipeline: PipelineOptions,
    pub verbose: bool,
}

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("please provide a schema with -s or -S")]
    NoSchema,
    #[error("could not find or access schema file {path}: {source}")]
    SchemaFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("empty schema file: {0}")]
    EmptySchema(PathBuf),
    #[error("schema file size is too big: {size} bytes > {MAX_SCHEMA_LEN} maximum supported length")]
    SchemaTooLarge { size: u64 },
    #[error("unable to parse schema: {0}")]
    Schema(#[from] SchemaError),
    #[error("schema rejected by the Avro writer: {0}")]
    WriterSchema(#[source] apache_avro::Error),
    #[error("memory stats is a Linux-only feature")]
    MemstatUnsupported,
    #[error("cannot open input file {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot create output file {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Sink(#[from] SinkError),
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        init_logging(self.debug);
        let config = self.to_config()?;
        let summary = execute(&config)?;
        if config.verbose {
            match serde_json::to_string(&summary) {
                Ok(json) => info!("summary {json}"),
                Err(e) => debug!("could not serialize summary: {e}"),
            }
        }
        Ok(())
    }

    pub fn to_config(&self) -> Result<RunConfig, SetupError> {
        if self.memstat && !MemoryStatus::supported() {
            return Err(SetupError::MemstatUnsupported);
        }

        let schema_text = match (&self.schema, &self.schema_file) {
            (Some(text), _) => text.clone(),
            (None, Some(path)) => read_schema_file(path)?,
            (None, None) => return Err(SetupError::NoSchema),
        };

        let (input, output) = match self.files.as_slice() {
            [output] => (Input::Stdin, output.as_str()),
            [input, output, ..] => (resolve_input(input), output.as_str()),
            [] => (Input::Stdin, "-"),
        };
        let output = match output {
            "-" => Output::Stdout,
            path => Output::Path(PathBuf::from(path)),
        };

        Ok(RunConfig {
            schema_text,
            input,
            output,
            codec: self.codec,
            block_size: if self.block_size == 0 { DEFAULT_BLOCK_SIZE } else { self.block_size },
            map_options: MapOptions {
                max_string_size: self.max_string_size,
                dump_unmatched_as_string: self.dump_json,
            },
            pipeline: PipelineOptions {
                on_malformed: if self.abort_on_error { MalformedPolicy::Abort } else { MalformedPolicy::Skip },
                // progress lines log at debug, so `-m` alone only adds memory samples
                progress_interval: (self.debug || self.memstat).then_some(DEFAULT_PROGRESS_INTERVAL),
                memory_stats: self.memstat,
            },
            verbose: self.debug,
        })
    }
}

/// Open input and output, convert every document, close the container.
///
/// Setup failures happen before the first record is read. A strict-mode
/// abort still closes the container so already written blocks stay readable;
/// a writer failure does not.
pub fn execute(config: &RunConfig) -> Result<RunSummary> {
    let schema = Schema::parse_str(&config.schema_text).map_err(SetupError::from)?;
    let avro_schema = apache_avro::Schema::parse_str(&config.schema_text)
        .map_err(SetupError::WriterSchema)?;

    let input: Box<dyn BufRead> = match &config.input {
        Input::Stdin => Box::new(io::stdin().lock()),
        Input::Path(path) => {
            let file = File::open(path).map_err(|source| SetupError::Input { path: path.clone(), source })?;
            Box::new(BufReader::new(file))
        }
    };
    let output: Box<dyn Write> = match &config.output {
        Output::Stdout => Box::new(io::stdout().lock()),
        Output::Path(path) => {
            let file = File::create(path).map_err(|source| SetupError::Output { path: path.clone(), source })?;
            Box::new(BufWriter::new(file))
        }
    };

    debug!("using codec: {}", config.codec.name());
    let sink = AvroSink::new(&avro_schema, output, config.codec, config.block_size)
        .map_err(SetupError::from)?;
    let mapper = Mapper::new(&schema, config.map_options);
    let mut pipeline = Pipeline::new(JsonStream::new(input), mapper, sink, config.pipeline);

    match pipeline.run() {
        Ok(summary) => {
            debug!("closing writer");
            close(pipeline.into_sink())?;
            Ok(summary)
        }
        Err(e @ PipelineError::Write { .. }) => Err(e.into()),
        Err(e) => {
            if let Err(close_err) = close(pipeline.into_sink()) {
                debug!("closing writer after abort failed: {close_err:#}");
            }
            Err(e.into())
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn close(sink: AvroSink<'_, Box<dyn Write>>) -> Result<()> {
    sink.finish().context("failed to finish the Avro container")?;
    Ok(())
}

fn read_schema_file(path: &Path) -> Result<String, SetupError> {
    let io_err = |source| SetupError::SchemaFile { path: path.to_path_buf(), source };
    let size = std::fs::metadata(path).map_err(io_err)?.len();
    if size == 0 {
        return Err(SetupError::EmptySchema(path.to_path_buf()));
    }
    if size > MAX_SCHEMA_LEN {
        return Err(SetupError::SchemaTooLarge { size });
    }
    std::fs::read_to_string(path).map_err(io_err)
}

fn resolve_input(arg: &str) -> Input {
    match arg {
        "-" => Input::Stdin,
        path => Input::Path(PathBuf::from(path)),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // stdout may carry the container
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"{"type": "record", "name": "R", "fields": [{"name": "a", "type": "int"}]}"#;

    fn parse(args: &[&str]) -> CommandLineInterface {
        CommandLineInterface::try_parse_from(std::iter::once("json2avro").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn one_file_argument_reads_stdin() {
        let config = parse(&["-s", SCHEMA, "out.avro"]).to_config().unwrap();
        assert_eq!(config.input, Input::Stdin);
        assert_eq!(config.output, Output::Path("out.avro".into()));
        assert_eq!(config.codec, CodecChoice::Null);
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.map_options, MapOptions::default());
        assert_eq!(config.pipeline.on_malformed, MalformedPolicy::Skip);
        assert_eq!(config.pipeline.progress_interval, None);
    }

    #[test]
    fn two_file_arguments_and_stdout() {
        let config = parse(&["-s", SCHEMA, "in.json", "-"]).to_config().unwrap();
        assert_eq!(config.input, Input::Path("in.json".into()));
        assert_eq!(config.output, Output::Stdout);
    }

    #[test]
    fn flags_resolve_into_config() {
        let config = parse(&["-s", SCHEMA, "-c", "lzma", "-b", "0", "-z", "12", "-j", "-x", "-d", "o.avro"])
            .to_config()
            .unwrap();
        assert_eq!(config.codec, CodecChoice::Lzma);
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.map_options, MapOptions { max_string_size: 12, dump_unmatched_as_string: true });
        assert_eq!(config.pipeline.on_malformed, MalformedPolicy::Abort);
        assert_eq!(config.pipeline.progress_interval, Some(DEFAULT_PROGRESS_INTERVAL));
        assert!(!config.pipeline.memory_stats);
        assert!(config.verbose);
    }

    #[test]
    fn rejects_bad_invocations() {
        let bad: [&[&str]; 4] = [
            &["out.avro"],                             // no schema
            &["-s", SCHEMA],                           // no files
            &["-s", SCHEMA, "a", "b", "c"],            // too many files
            &["-s", SCHEMA, "-c", "brotli", "o.avro"], // unknown codec
        ];
        for args in bad {
            let argv = std::iter::once("json2avro").chain(args.iter().copied());
            assert!(CommandLineInterface::try_parse_from(argv).is_err(), "accepted {args:?}");
        }
    }

    #[test]
    fn schema_file_limits() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.avsc");
        std::fs::write(&empty, "").unwrap();
        assert!(matches!(read_schema_file(&empty), Err(SetupError::EmptySchema(_))));

        let big = dir.path().join("big.avsc");
        std::fs::write(&big, vec![b' '; MAX_SCHEMA_LEN as usize + 1]).unwrap();
        assert!(matches!(read_schema_file(&big), Err(SetupError::SchemaTooLarge { .. })));

        let missing = dir.path().join("missing.avsc");
        assert!(matches!(read_schema_file(&missing), Err(SetupError::SchemaFile { .. })));

        let good = dir.path().join("good.avsc");
        std::fs::write(&good, SCHEMA).unwrap();
        assert_eq!(read_schema_file(&good).unwrap(), SCHEMA);
    }
}
