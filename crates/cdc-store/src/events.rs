//! Event batch files.
//!
//! A batch is a JSON Lines file, one [`Event`] per line. The bronze layout
//! keeps landed batches per business date:
//! `<bronze_root>/event_date=YYYY-MM-DD/batch_<stamp>.jsonl`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cdc_schemas::Event;
use chrono::{NaiveDate, Utc};

use crate::file::write_atomic;

/// Parse a JSON Lines batch. Blank lines are ignored; a malformed line fails
/// the whole read with its 1-based line number.
pub fn parse_events_jsonl(text: &str) -> Result<Vec<Event>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let ev: Event =
            serde_json::from_str(line).with_context(|| format!("invalid event on line {}", idx + 1))?;
        out.push(ev);
    }
    Ok(out)
}

pub fn read_events_jsonl(path: &Path) -> Result<Vec<Event>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read events file failed: {}", path.display()))?;
    parse_events_jsonl(&text).with_context(|| format!("parse events file: {}", path.display()))
}

pub fn write_events_jsonl(path: &Path, events: &[Event]) -> Result<()> {
    let mut buf = Vec::new();
    for ev in events {
        serde_json::to_writer(&mut buf, ev).context("serialize event failed")?;
        buf.push(b'\n');
    }
    write_atomic(path, &buf)
}

pub fn bronze_partition(bronze_root: &Path, run_date: NaiveDate) -> PathBuf {
    bronze_root.join(format!("event_date={run_date}"))
}

/// Every batch landed for `run_date`, concatenated in file-name order.
/// An absent partition is an empty batch.
pub fn read_bronze_partition(bronze_root: &Path, run_date: NaiveDate) -> Result<Vec<Event>> {
    let dir = bronze_partition(bronze_root, run_date);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("list bronze partition failed: {}", dir.display()))
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("list {}", dir.display()))?
            .path();
        if path.extension().is_some_and(|ext| ext == "jsonl") {
            files.push(path);
        }
    }
    files.sort();

    let mut events = Vec::new();
    for file in files {
        events.extend(read_events_jsonl(&file)?);
    }
    Ok(events)
}

/// Land a batch under its date partition; returns the written path.
pub fn land_bronze_batch(
    bronze_root: &Path,
    run_date: NaiveDate,
    events: &[Event],
) -> Result<PathBuf> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%6f");
    let path = bronze_partition(bronze_root, run_date).join(format!("batch_{stamp}.jsonl"));
    write_events_jsonl(&path, events)?;
    Ok(path)
}
