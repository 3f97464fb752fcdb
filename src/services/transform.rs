//! Chunked pass-through stages for the ingest pipeline.
//!
//! Each stage sees the chunks of one stream in arrival order and hands zero or
//! more chunks to the next stage. Stages run synchronously between the
//! pipeline's I/O awaits.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("malformed input at record {record}: {reason}")]
    Malformed { record: u64, reason: String },

    #[error("record {record} exceeds the {limit} byte limit")]
    RecordTooLarge { record: u64, limit: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV writer error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait PassThroughTransform: Send {
    fn name(&self) -> &str;

    /// Consumes one chunk and returns what should travel downstream.
    fn transform(&mut self, chunk: Bytes) -> Result<Vec<Bytes>, TransformError>;

    /// Called once after the last chunk; flushes any retained state.
    fn finish(&mut self) -> Result<Vec<Bytes>, TransformError> {
        Ok(Vec::new())
    }
}

/// Ordered list of stages owned by one stream.
#[derive(Default)]
pub struct TransformChain {
    stages: Vec<Box<dyn PassThroughTransform>>,
}

impl TransformChain {
    pub fn new(stages: Vec<Box<dyn PassThroughTransform>>) -> Self {
        let names: Vec<&str> = stages.iter().map(|s| s.name()).collect();
        tracing::debug!("Transform chain: {:?}", names);
        Self { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs one inbound chunk through every stage.
    pub fn push(&mut self, chunk: Bytes) -> Result<Vec<Bytes>, TransformError> {
        let mut pending = vec![chunk];
        for stage in self.stages.iter_mut() {
            pending = feed(stage.as_mut(), pending)?;
        }
        Ok(pending)
    }

    /// Finishes stages in order; the tail of each stage flows through the
    /// following stages before they are finished themselves.
    pub fn finish(&mut self) -> Result<Vec<Bytes>, TransformError> {
        let mut pending = Vec::new();
        for stage in self.stages.iter_mut() {
            pending = feed(stage.as_mut(), pending)?;
            pending.extend(stage.finish()?);
        }
        Ok(pending)
    }
}

fn feed(
    stage: &mut dyn PassThroughTransform,
    chunks: Vec<Bytes>,
) -> Result<Vec<Bytes>, TransformError> {
    let mut out = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        out.extend(stage.transform(chunk)?);
    }
    Ok(out)
}

/// Observes the stream for progress logging; output is the input, untouched.
pub struct ProgressTransform {
    label: String,
    chunks: u64,
    bytes: u64,
}

impl ProgressTransform {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            chunks: 0,
            bytes: 0,
        }
    }

    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl PassThroughTransform for ProgressTransform {
    fn name(&self) -> &str {
        "progress"
    }

    fn transform(&mut self, chunk: Bytes) -> Result<Vec<Bytes>, TransformError> {
        self.chunks += 1;
        self.bytes += chunk.len() as u64;
        tracing::debug!("Processing {} chunk #{} ({} bytes)", self.label, self.chunks, chunk.len());
        Ok(vec![chunk])
    }

    fn finish(&mut self) -> Result<Vec<Bytes>, TransformError> {
        tracing::info!(
            "📦 {} stream complete: {} chunks, {} bytes",
            self.label,
            self.chunks,
            self.bytes
        );
        Ok(Vec::new())
    }
}

/// Where the boundary scan stands relative to CSV quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quoting {
    FieldStart,
    Unquoted,
    Quoted,
    /// Saw `"` inside a quoted field: either the closing quote or the first
    /// half of an escaped `""`.
    QuoteInQuoted,
}

/// Re-serializes CSV input record by record.
///
/// Input is split on record boundaries (newlines outside quoted fields), each
/// batch of complete records is parsed with the `csv` crate and written back
/// out as normalized CSV. Only the trailing partial record is kept between
/// chunks.
pub struct CsvTransform {
    pending: BytesMut,
    /// Bytes of `pending` already scanned for boundaries.
    scanned: usize,
    quoting: Quoting,
    header_fields: Option<usize>,
    /// Records emitted so far, header included.
    records: u64,
    max_record_len: usize,
}

impl CsvTransform {
    pub fn new(max_record_len: usize) -> Self {
        Self {
            pending: BytesMut::new(),
            scanned: 0,
            quoting: Quoting::FieldStart,
            header_fields: None,
            records: 0,
            max_record_len,
        }
    }

    /// Data records emitted so far, excluding the header.
    pub fn data_records(&self) -> u64 {
        self.records.saturating_sub(1)
    }

    /// Offset one past the last record terminator in `pending`.
    fn scan_boundary(&mut self) -> Option<usize> {
        let mut boundary = None;
        for (offset, &byte) in self.pending[self.scanned..].iter().enumerate() {
            self.quoting = match (self.quoting, byte) {
                (Quoting::Quoted, b'"') => Quoting::QuoteInQuoted,
                (Quoting::Quoted, _) => Quoting::Quoted,
                (Quoting::FieldStart, b'"') | (Quoting::QuoteInQuoted, b'"') => Quoting::Quoted,
                (_, b',') => Quoting::FieldStart,
                (_, b'\n') => {
                    boundary = Some(self.scanned + offset + 1);
                    Quoting::FieldStart
                }
                // A quote after the first byte of a field is literal
                _ => Quoting::Unquoted,
            };
        }
        self.scanned = self.pending.len();
        boundary
    }

    fn reserialize(&mut self, complete: &[u8]) -> Result<Bytes, TransformError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(complete);
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .flexible(true)
            .from_writer(Vec::with_capacity(complete.len()));

        let mut record = csv::ByteRecord::new();
        while reader.read_byte_record(&mut record)? {
            let record_no = self.records + 1;
            match self.header_fields {
                None => self.header_fields = Some(record.len()),
                Some(expected) if expected != record.len() => {
                    return Err(TransformError::Malformed {
                        record: record_no,
                        reason: format!("expected {} fields, found {}", expected, record.len()),
                    });
                }
                Some(_) => {}
            }
            writer.write_byte_record(&record)?;
            self.records = record_no;
        }

        let out = writer
            .into_inner()
            .map_err(|e| TransformError::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))?;
        Ok(Bytes::from(out))
    }
}

impl PassThroughTransform for CsvTransform {
    fn name(&self) -> &str {
        "csv"
    }

    fn transform(&mut self, chunk: Bytes) -> Result<Vec<Bytes>, TransformError> {
        self.pending.extend_from_slice(&chunk);

        let Some(boundary) = self.scan_boundary() else {
            if self.pending.len() > self.max_record_len {
                return Err(TransformError::RecordTooLarge {
                    record: self.records + 1,
                    limit: self.max_record_len,
                });
            }
            return Ok(Vec::new());
        };

        let complete = self.pending.split_to(boundary).freeze();
        self.scanned = self.pending.len();
        if self.pending.len() > self.max_record_len {
            return Err(TransformError::RecordTooLarge {
                record: self.records + 1,
                limit: self.max_record_len,
            });
        }

        let out = self.reserialize(&complete)?;
        Ok(if out.is_empty() { Vec::new() } else { vec![out] })
    }

    fn finish(&mut self) -> Result<Vec<Bytes>, TransformError> {
        if self.quoting == Quoting::Quoted {
            return Err(TransformError::Malformed {
                record: self.records + 1,
                reason: "unterminated quoted field".to_string(),
            });
        }

        let tail = self.pending.split().freeze();
        self.scanned = 0;
        let out = if tail.is_empty() {
            Bytes::new()
        } else {
            self.reserialize(&tail)?
        };

        tracing::info!("🧾 CSV parsed: {} data records", self.data_records());
        Ok(if out.is_empty() { Vec::new() } else { vec![out] })
    }
}
