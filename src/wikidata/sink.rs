//! Buffered gzip NDJSON sink for the filter's output streams.
//!
//! The first output line of every stream is a metadata object; entity
//! records follow one per line. Records are buffered in memory and flushed
//! to the encoder when the buffer threshold is reached.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;

use crate::models::EntityRecord;

pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Metadata object written as the first line of a stream.
#[derive(Debug, Clone, Serialize)]
pub struct SinkMetadata {
    pub source: String,
    pub filter: String,
    pub start_time: String,
}

pub struct RecordSink {
    encoder: GzEncoder<BufWriter<File>>,
    buffer: Vec<String>,
    buffer_size: usize,
    /// Entity records written, excluding the metadata line.
    records_written: u64,
}

impl RecordSink {
    pub fn create(
        path: &Path,
        source: &str,
        filter_description: &str,
        buffer_size: usize,
    ) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output stream {}", path.display()))?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());

        let metadata = SinkMetadata {
            source: source.to_string(),
            filter: filter_description.to_string(),
            start_time: Utc::now().to_rfc3339(),
        };
        let header = serde_json::json!({ "metadata": metadata });
        serde_json::to_writer(&mut encoder, &header)?;
        encoder.write_all(b"\n")?;

        Ok(Self {
            encoder,
            buffer: Vec::with_capacity(buffer_size),
            buffer_size: buffer_size.max(1),
            records_written: 0,
        })
    }

    pub fn push(&mut self, record: &EntityRecord) -> Result<()> {
        self.buffer.push(serde_json::to_string(record)?);
        if self.buffer.len() >= self.buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        for line in self.buffer.drain(..) {
            self.encoder.write_all(line.as_bytes())?;
            self.encoder.write_all(b"\n")?;
            self.records_written += 1;
        }
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written + self.buffer.len() as u64
    }

    /// Flush the remaining buffer and finish the gzip member.
    pub fn finish(mut self) -> Result<u64> {
        self.flush()?;
        let mut writer = self.encoder.finish().context("Failed to finish gzip stream")?;
        writer.flush()?;
        Ok(self.records_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WikidataPlace;
    use flate2::read::GzDecoder;
    use std::io::{BufRead, BufReader};

    fn place(qid: &str) -> EntityRecord {
        EntityRecord::Place(WikidataPlace {
            qid: qid.to_string(),
            name: qid.to_string(),
            latitude: 1.0,
            longitude: 2.0,
            ..Default::default()
        })
    }

    #[test]
    fn metadata_first_then_one_record_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places.jsonl.gz");

        let mut sink = RecordSink::create(&path, "dump.json.gz", "P625", 2).unwrap();
        for i in 0..5 {
            sink.push(&place(&format!("Q{}", i))).unwrap();
        }
        let written = sink.finish().unwrap();
        assert_eq!(written, 5);

        let reader = BufReader::new(GzDecoder::new(File::open(&path).unwrap()));
        let lines: Vec<String> = reader.lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 6);

        let header: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(header["metadata"]["source"], "dump.json.gz");
        assert_eq!(header["metadata"]["filter"], "P625");

        let first: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(first["qid"], "Q0");
        assert_eq!(first["kind"], "place");
    }
}
