use crate::error::LogError;
use crate::record::Record;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

const ARCHIVE_LEVEL: i32 = 3;

/// Append one retired log generation to the archive as its own zstd frame.
///
/// Frames concatenate, so the archive decompresses as one continuous JSONL
/// stream. Empty generations are skipped.
pub fn archive_generation(archive_path: &Path, log_bytes: &[u8]) -> io::Result<()> {
    if log_bytes.is_empty() {
        return Ok(());
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(archive_path)?;
    let mut encoder = zstd::Encoder::new(file, ARCHIVE_LEVEL)?;
    encoder.write_all(log_bytes)?;
    encoder.finish()?.sync_data()
}

/// Decode every record ever archived, oldest generation first.
///
/// Returns an empty list when no archive exists yet.
pub fn read_archived_records(archive_path: &Path) -> Result<Vec<Record>, LogError> {
    if !archive_path.exists() {
        return Ok(Vec::new());
    }
    let decoder = zstd::Decoder::new(File::open(archive_path)?)?;
    let mut records = Vec::new();
    for line in BufReader::new(decoder).lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}
