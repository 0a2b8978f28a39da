use crate::archive;
use crate::error::LogError;
use crate::query::{FindOptions, Query};
use crate::record::Record;
use crate::store::{Document, DocumentStore};
use fs2::FileExt;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const LOG_FILE: &str = "cards.jsonl";
const LOCK_FILE: &str = "cards.lock";
const ARCHIVE_FILE: &str = "archive.jsonl.zst";

/// Whether opening a log takes the directory's advisory writer lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Fail to open while another handle holds the lock.
    #[default]
    Exclusive,
    /// Skip locking entirely. The caller guarantees a single writer.
    None,
}

/// Point-in-time counters for a [`DocumentLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStats {
    /// Documents currently live.
    pub live: usize,
    /// Records in the active log file, superseded ones and tombstones included.
    pub records: u64,
    /// Size of the active log file in bytes.
    pub bytes: u64,
}

/// Configures and opens a [`DocumentLog`].
#[derive(Debug, Clone)]
pub struct DocumentLogBuilder {
    dir: PathBuf,
    lock_mode: LockMode,
    compact_on_open: bool,
    archive: bool,
}

impl DocumentLogBuilder {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        DocumentLogBuilder {
            dir: dir.as_ref().to_path_buf(),
            lock_mode: LockMode::Exclusive,
            compact_on_open: true,
            archive: false,
        }
    }

    pub fn lock_mode(mut self, mode: LockMode) -> Self {
        self.lock_mode = mode;
        self
    }

    /// Rewrite the log down to live documents right after loading it.
    /// Enabled by default.
    pub fn compact_on_open(mut self, enabled: bool) -> Self {
        self.compact_on_open = enabled;
        self
    }

    /// Keep each retired log generation in `archive.jsonl.zst` when
    /// compacting. Disabled by default.
    pub fn archive(mut self, enabled: bool) -> Self {
        self.archive = enabled;
        self
    }

    /// Create the directory if needed, take the lock, and load the log.
    ///
    /// # Errors
    ///
    /// [`LogError::Locked`] if another writer holds the directory,
    /// [`LogError::Corrupt`] if a complete line fails to parse or verify,
    /// or any I/O error from the filesystem.
    pub fn open(self) -> Result<DocumentLog, LogError> {
        fs::create_dir_all(&self.dir)?;

        let lock = match self.lock_mode {
            LockMode::Exclusive => Some(acquire_lock(&self.dir.join(LOCK_FILE))?),
            LockMode::None => None,
        };

        let log_path = self.dir.join(LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let mut log = DocumentLog {
            archive_path: self.dir.join(ARCHIVE_FILE),
            dir: self.dir,
            log_path,
            file,
            _lock: lock,
            docs: BTreeMap::new(),
            next_key: 0,
            records: 0,
            archive: self.archive,
        };
        log.replay()?;

        if self.compact_on_open {
            log.compact()?;
        }
        Ok(log)
    }
}

/// An embedded, append-only JSON document log holding one collection.
///
/// Every mutation appends records to `cards.jsonl` and syncs before the
/// in-memory state changes. Reads are served from memory. Superseded
/// records and tombstones stay in the file until [`compact`](DocumentStore::compact)
/// rewrites it.
pub struct DocumentLog {
    dir: PathBuf,
    log_path: PathBuf,
    archive_path: PathBuf,
    file: File,
    _lock: Option<File>,
    docs: BTreeMap<u64, Document>,
    next_key: u64,
    records: u64,
    archive: bool,
}

impl std::fmt::Debug for DocumentLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentLog")
            .field("log_path", &self.log_path)
            .field("live", &self.docs.len())
            .field("records", &self.records)
            .finish()
    }
}

impl DocumentLog {
    /// Open with default settings: exclusive lock, compact on open, no archive.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, LogError> {
        DocumentLogBuilder::new(dir).open()
    }

    pub fn builder(dir: impl AsRef<Path>) -> DocumentLogBuilder {
        DocumentLogBuilder::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn stats(&self) -> Result<LogStats, LogError> {
        Ok(LogStats {
            live: self.docs.len(),
            records: self.records,
            bytes: fs::metadata(&self.log_path)?.len(),
        })
    }

    /// Read back every record in the active log file, in append order.
    pub fn records(&self) -> Result<Vec<Record>, LogError> {
        let file = File::open(&self.log_path)?;
        let file_len = file.metadata()?.len();
        RecordIterator::new(BufReader::new(file).lines(), file_len).collect()
    }

    /// Records from every archived log generation, oldest first.
    pub fn archived_records(&self) -> Result<Vec<Record>, LogError> {
        archive::read_archived_records(&self.archive_path)
    }

    fn replay(&mut self) -> Result<(), LogError> {
        let file = File::open(&self.log_path)?;
        let file_len = file.metadata()?.len();
        let mut iter = RecordIterator::new(BufReader::new(file).lines(), file_len);

        for result in &mut iter {
            let record = result?;
            self.apply(record);
            self.records += 1;
        }

        // A tail without a trailing newline is a write that never finished.
        if iter.pos < file_len {
            warn!(
                "{}: dropping {} bytes of incomplete record at end of log",
                self.log_path.display(),
                file_len - iter.pos
            );
            self.file.set_len(iter.pos)?;
        }

        debug!(
            "{}: replayed {} records, {} live documents",
            self.log_path.display(),
            self.records,
            self.docs.len()
        );
        Ok(())
    }

    fn apply(&mut self, record: Record) {
        self.next_key = self.next_key.max(record.key().saturating_add(1));
        match record {
            Record::Insert { key, doc, .. } | Record::Update { key, doc, .. } => {
                self.docs.insert(key, doc);
            }
            Record::Remove { key } => {
                self.docs.remove(&key);
            }
        }
    }

    /// Append records as one write, sync, then apply them in memory.
    fn commit(&mut self, records: Vec<Record>) -> Result<(), LogError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut buf = String::new();
        for record in &records {
            buf.push_str(&serde_json::to_string(record)?);
            buf.push('\n');
        }
        let len = self.file.metadata()?.len();
        let written = self
            .file
            .write_all(buf.as_bytes())
            .and_then(|()| self.file.sync_data());
        rollback_on_error(&self.file, len, written)?;

        self.records += records.len() as u64;
        for record in records {
            self.apply(record);
        }
        Ok(())
    }

    fn matching_keys(&self, query: &Query, multi: bool) -> Vec<u64> {
        let matches = self
            .docs
            .iter()
            .filter(|(_, doc)| query.matches(doc))
            .map(|(key, _)| *key);
        if multi {
            matches.collect()
        } else {
            matches.take(1).collect()
        }
    }
}

impl DocumentStore for DocumentLog {
    fn find(&self, query: &Query, options: &FindOptions) -> Result<Vec<Document>, LogError> {
        let docs = self
            .docs
            .values()
            .filter(|doc| query.matches(doc))
            .cloned()
            .collect();
        Ok(options.apply(docs))
    }

    fn insert(&mut self, docs: Vec<Document>) -> Result<Vec<Document>, LogError> {
        let mut records = Vec::with_capacity(docs.len());
        for (i, doc) in docs.iter().enumerate() {
            records.push(Record::insert(self.next_key + i as u64, doc.clone())?);
        }
        self.commit(records)?;
        Ok(docs)
    }

    fn update(&mut self, query: &Query, patch: &Document, multi: bool) -> Result<usize, LogError> {
        let keys = self.matching_keys(query, multi);
        let mut records = Vec::with_capacity(keys.len());
        for key in &keys {
            let mut merged = self.docs[key].clone();
            merged.extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
            records.push(Record::update(*key, merged)?);
        }
        self.commit(records)?;
        Ok(keys.len())
    }

    fn remove(&mut self, query: &Query, multi: bool) -> Result<usize, LogError> {
        let keys = self.matching_keys(query, multi);
        self.commit(keys.iter().copied().map(Record::remove).collect())?;
        Ok(keys.len())
    }

    /// Rewrite `cards.jsonl` to one insert record per live document.
    ///
    /// The new generation is written to `cards.jsonl.tmp`, synced, and renamed
    /// over the active log, so a crash leaves either the old or the new file.
    fn compact(&mut self) -> Result<(), LogError> {
        if self.archive {
            archive::archive_generation(&self.archive_path, &fs::read(&self.log_path)?)?;
        }

        let tmp_path = self.log_path.with_extension("jsonl.tmp");
        let mut buf = String::new();
        for (key, doc) in &self.docs {
            buf.push_str(&serde_json::to_string(&Record::insert(*key, doc.clone())?)?);
            buf.push('\n');
        }

        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(buf.as_bytes())?;
        tmp.sync_data()?;
        drop(tmp);
        fs::rename(&tmp_path, &self.log_path)?;

        self.file = OpenOptions::new().append(true).open(&self.log_path)?;

        debug!(
            "{}: compacted {} records down to {}",
            self.log_path.display(),
            self.records,
            self.docs.len()
        );
        self.records = self.docs.len() as u64;
        Ok(())
    }
}

/// Cut `file` back to `len` if `result` failed, so a half-written or unsynced
/// record never stays ahead of the next append.
fn rollback_on_error<T>(file: &File, len: u64, result: io::Result<T>) -> io::Result<T> {
    if result.is_err() {
        if let Err(e) = file.set_len(len) {
            warn!("failed to truncate log back to {len} bytes after a failed append: {e}");
        }
    }
    result
}

fn acquire_lock(lock_path: &Path) -> Result<File, LogError> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => Err(LogError::Locked {
            path: lock_path.to_path_buf(),
        }),
        Err(e) => Err(LogError::Io(e)),
    }
}

/// Yields verified records from a log file, stopping at a partial last line.
struct RecordIterator<I> {
    lines: I,
    pos: u64,
    line: u64,
    file_len: u64,
}

impl<I> RecordIterator<I> {
    fn new(lines: I, file_len: u64) -> Self {
        RecordIterator {
            lines,
            pos: 0,
            line: 0,
            file_len,
        }
    }
}

impl<I: Iterator<Item = io::Result<String>>> Iterator for RecordIterator<I> {
    type Item = Result<Record, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };

            let line_bytes = line.len() as u64;

            // Content reaching EOF without a newline: crash mid-append.
            if self.pos + line_bytes >= self.file_len {
                return None;
            }

            self.pos += line_bytes + 1;
            self.line += 1;

            if line.is_empty() {
                continue;
            }

            let record: Record = match serde_json::from_str(&line) {
                Ok(record) => record,
                Err(e) => {
                    return Some(Err(LogError::Corrupt {
                        line: self.line,
                        reason: e.to_string(),
                    }));
                }
            };
            if let Err(reason) = record.verify() {
                return Some(Err(LogError::Corrupt {
                    line: self.line,
                    reason,
                }));
            }
            return Some(Ok(record));
        }
    }
}
