//! Append-only JSONL persistence for the search and feedback logs.

use crate::error::Result;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Mutex;

/// Serializes `record` as one JSON line and appends it to `path`, creating
/// the file if needed. Acquires the file handle only for the duration of
/// the write so it releases on every exit path, including an error return.
pub fn append_jsonl<T: Serialize>(path: &str, record: &T) -> Result<()> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// Reads every JSON line from `path` into `T`, skipping lines that fail to
/// parse. Returns an empty vec when the file doesn't exist yet.
pub fn iter_jsonl<T: serde::de::DeserializeOwned>(path: &str) -> Result<Vec<T>> {
    if !Path::new(path).exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(record) = serde_json::from_str(&line) {
            out.push(record);
        }
    }
    Ok(out)
}

/// Guards a single JSONL file's append calls with a process-local lock, so
/// concurrent requests never interleave partial lines. Each component
/// (search log, feedback log) owns one of these.
#[derive(Default)]
pub struct JsonlAppender {
    path: String,
    lock: Mutex<()>,
}

impl JsonlAppender {
    pub fn new(path: String) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn append<T: Serialize>(&self, record: &T) -> Result<()> {
        let _guard = self.lock.lock().unwrap();
        append_jsonl(&self.path, record)
    }

    pub fn read_all<T: serde::de::DeserializeOwned>(&self) -> Result<Vec<T>> {
        let _guard = self.lock.lock().unwrap();
        iter_jsonl(&self.path)
    }
}
