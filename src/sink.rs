//! Append-only JSONL destinations.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::record::RecordMap;

/// One output destination. The file is truncated at open so a re-run of the
/// same pass produces the same content.
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl JsonlSink {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let file =
            File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Appends one record as a single JSON line, keys in insertion order.
    pub fn write(&mut self, record: &RecordMap) -> Result<()> {
        let line = serde_json::to_string(record)?;
        writeln!(self.writer, "{line}")
            .with_context(|| format!("writing {}", self.path.display()))?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("flushing {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RecordMap {
        let mut map = RecordMap::new();
        map.insert("id".to_string(), json!(0));
        map.insert("label".to_string(), json!("Yes"));
        map
    }

    #[test]
    fn writes_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let mut sink = JsonlSink::create(&path).unwrap();
        sink.write(&sample()).unwrap();
        sink.write(&sample()).unwrap();
        assert_eq!(sink.written(), 2);
        sink.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"id":0,"label":"Yes"}"#);
    }

    #[test]
    fn reopening_truncates_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let mut sink = JsonlSink::create(&path).unwrap();
        sink.write(&sample()).unwrap();
        sink.finish().unwrap();

        let sink = JsonlSink::create(&path).unwrap();
        sink.finish().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.jsonl");
        let sink = JsonlSink::create(&path).unwrap();
        sink.finish().unwrap();
        assert!(path.exists());
    }
}
