#![forbid(unsafe_code)]

//! JSONL sink mirroring diagnostics entries.
//!
//! Lines are written in call order behind a mutex. Each line is one JSON
//! object carrying the [`DIAGNOSTICS_SCHEMA_VERSION`] tag, so tooling can
//! tell apart lines from different engine versions.

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::config::DiagnosticsConfig;
use crate::diagnostics::DiagnosticsEntry;

/// Schema tag on every line.
pub const DIAGNOSTICS_SCHEMA_VERSION: &str = "apz-diagnostics-v1";

/// Where lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkDestination {
    Stdout,
    /// Append to a file.
    File(PathBuf),
}

impl SinkDestination {
    #[must_use]
    pub fn for_config(config: &DiagnosticsConfig) -> Self {
        match &config.sink_path {
            Some(path) => Self::File(PathBuf::from(path)),
            None => Self::Stdout,
        }
    }
}

struct SinkInner {
    writer: BufWriter<Box<dyn Write + Send>>,
    flush_on_write: bool,
}

#[derive(Serialize)]
struct Line<'a> {
    schema: &'static str,
    #[serde(flatten)]
    entry: &'a DiagnosticsEntry,
}

/// Shared line-oriented sink.
#[derive(Clone)]
pub struct DiagnosticsSink {
    inner: Arc<Mutex<SinkInner>>,
}

impl std::fmt::Debug for DiagnosticsSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsSink").finish()
    }
}

impl DiagnosticsSink {
    /// Open the sink `config` describes. `Ok(None)` when it is disabled.
    pub fn from_config(config: &DiagnosticsConfig) -> io::Result<Option<Self>> {
        if !config.sink_enabled {
            return Ok(None);
        }
        let writer: Box<dyn Write + Send> = match SinkDestination::for_config(config) {
            SinkDestination::Stdout => Box::new(io::stdout()),
            SinkDestination::File(path) => {
                Box::new(OpenOptions::new().create(true).append(true).open(path)?)
            }
        };
        Ok(Some(Self::from_writer(writer, config.flush_on_write)))
    }

    /// Sink over any writer.
    #[must_use]
    pub fn from_writer(writer: Box<dyn Write + Send>, flush_on_write: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SinkInner {
                writer: BufWriter::new(writer),
                flush_on_write,
            })),
        }
    }

    /// Write one entry as a tagged JSON line.
    pub fn write_entry(&self, entry: &DiagnosticsEntry) -> io::Result<()> {
        let line = serde_json::to_string(&Line {
            schema: DIAGNOSTICS_SCHEMA_VERSION,
            entry,
        })?;
        self.write_jsonl(&line)
    }

    /// Write a raw line and a newline.
    pub fn write_jsonl(&self, line: &str) -> io::Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.writer.write_all(line.as_bytes())?;
        inner.writer.write_all(b"\n")?;
        if inner.flush_on_write {
            inner.writer.flush()?;
        }
        Ok(())
    }

    pub fn flush(&self) -> io::Result<()> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .writer
            .flush()
    }
}
