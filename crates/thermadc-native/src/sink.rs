//! Record sinks
//!
//! A sink receives the metadata header once, then batches of records lent
//! from the sampling loop's buffer. The loop only empties its buffer once a
//! batch is accepted. Any sink error is fatal to the loop.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use crate::config::TextFormat;
use crate::record::{Metadata, Record};

/// Sink errors.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Underlying writer failed
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Write attempted after [`RecordSink::close`]
    #[error("sink is closed")]
    Closed,
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Append-only destination for records.
pub trait RecordSink {
    /// Write the metadata block and column descriptor.
    ///
    /// # Errors
    ///
    /// Any write failure.
    fn write_header(&mut self, metadata: &Metadata) -> SinkResult<()>;

    /// Append a batch.
    ///
    /// # Errors
    ///
    /// Any write failure. The caller still holds the records and may offer
    /// them again.
    fn write_records(&mut self, records: &[Record]) -> SinkResult<()>;

    /// Push written data to the destination.
    ///
    /// # Errors
    ///
    /// Any flush failure.
    fn flush(&mut self) -> SinkResult<()>;

    /// Flush and release the destination. Later writes fail.
    ///
    /// # Errors
    ///
    /// Any flush failure.
    fn close(&mut self) -> SinkResult<()>;
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn write_header(&mut self, metadata: &Metadata) -> SinkResult<()> {
        (**self).write_header(metadata)
    }

    fn write_records(&mut self, records: &[Record]) -> SinkResult<()> {
        (**self).write_records(records)
    }

    fn flush(&mut self) -> SinkResult<()> {
        (**self).flush()
    }

    fn close(&mut self) -> SinkResult<()> {
        (**self).close()
    }
}

// ============================================================================
// Text Sink
// ============================================================================

/// Delimited text lines on any [`Write`].
pub struct TextSink<W: Write> {
    writer: W,
    format: TextFormat,
    closed: bool,
}

impl<W: Write> TextSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W, format: TextFormat) -> Self {
        Self { writer, format, closed: false }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn writer(&mut self) -> SinkResult<&mut W> {
        if self.closed {
            Err(SinkError::Closed)
        } else {
            Ok(&mut self.writer)
        }
    }

    fn write_line(&mut self, line: &str) -> SinkResult<()> {
        let newline = self.format.newline.clone();
        let writer = self.writer()?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(newline.as_bytes())?;
        Ok(())
    }
}

impl TextSink<BufWriter<File>> {
    /// Open `path` for writing, appending to or truncating an existing file.
    ///
    /// # Errors
    ///
    /// [`SinkError::Io`] if the file cannot be opened.
    pub fn create(path: impl AsRef<Path>, append: bool, format: TextFormat) -> SinkResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        Ok(Self::new(BufWriter::new(file), format))
    }
}

impl<W: Write> RecordSink for TextSink<W> {
    fn write_header(&mut self, metadata: &Metadata) -> SinkResult<()> {
        self.write_line("#<METADATA>")?;
        for (key, value) in metadata.entries() {
            self.write_line(&format!("#{key} = {value}"))?;
        }
        self.write_line("#</METADATA>")?;
        let columns = metadata.column_names().join(self.format.delimiter.as_str());
        self.write_line(&columns)?;
        self.flush()
    }

    fn write_records(&mut self, records: &[Record]) -> SinkResult<()> {
        self.writer()?;
        for record in records {
            let line = record.to_line(&self.format);
            self.write_line(&line)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        self.writer()?.flush()?;
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.writer.flush();
        self.closed = true;
        result.map_err(SinkError::from)
    }
}

// ============================================================================
// Memory Sink
// ============================================================================

/// In-memory sink that keeps every batch; useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Header, once written
    pub metadata: Option<Metadata>,
    /// Batches in arrival order
    pub batches: Vec<Vec<Record>>,
    /// Number of `flush` calls
    pub flushes: usize,
    /// Whether `close` has been called
    pub closed: bool,
    /// Fail the n-th `write_records` call (1-based); later calls succeed
    pub fail_on_batch: Option<usize>,
    /// Number of `write_records` calls, failed ones included
    pub write_calls: usize,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records across batches.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.batches.iter().flatten()
    }
}

impl RecordSink for MemorySink {
    fn write_header(&mut self, metadata: &Metadata) -> SinkResult<()> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        self.metadata = Some(metadata.clone());
        Ok(())
    }

    fn write_records(&mut self, records: &[Record]) -> SinkResult<()> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        self.write_calls += 1;
        if self.fail_on_batch == Some(self.write_calls) {
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.batches.push(records.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        self.flushes += 1;
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        self.closed = true;
        Ok(())
    }
}
