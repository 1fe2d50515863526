//! Line-oriented access to the compressed dump.
//!
//! The uncompressed dump is a JSON array printed one entity per line: the
//! first line is `[`, each entity line optionally ends with `,`, the final
//! line is `]`. Bracket-only and empty lines are skipped silently.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;

/// Iterator over trimmed entity lines of a (possibly gzipped) dump file.
pub struct DumpLines {
    reader: Box<dyn BufRead>,
    buf: String,
}

impl DumpLines {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open dump file {}", path.display()))?;
        let reader: Box<dyn BufRead> = if path.extension().map_or(false, |e| e == "gz") {
            Box::new(BufReader::with_capacity(
                1 << 20,
                MultiGzDecoder::new(BufReader::with_capacity(1 << 20, file)),
            ))
        } else {
            Box::new(BufReader::with_capacity(1 << 20, file))
        };
        Ok(Self {
            reader,
            buf: String::new(),
        })
    }
}

impl Iterator for DumpLines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            let line = self.buf.trim();
            if line.is_empty() || line == "[" || line == "]" {
                continue;
            }
            let line = line.strip_suffix(',').unwrap_or(line);
            return Some(Ok(line.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn skips_brackets_and_trailing_commas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.json");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "[").unwrap();
        writeln!(f, "{{\"id\":\"Q1\"}},").unwrap();
        writeln!(f, "").unwrap();
        writeln!(f, "{{\"id\":\"Q2\"}}").unwrap();
        writeln!(f, "]").unwrap();
        drop(f);

        let lines: Vec<String> = DumpLines::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(lines, vec!["{\"id\":\"Q1\"}", "{\"id\":\"Q2\"}"]);
    }
}
