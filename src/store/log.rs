//! Append-only prediction log backed by a newline-delimited JSON file

use crate::store::codec::{self, DecodeError, MAX_RECORD_LEN};
use crate::store::StoreError;
use crate::types::prediction::PredictionRecord;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// Why a scanned line did not yield a record
#[derive(Debug, Error)]
pub enum ScanFault {
    /// Line is not a valid record; callers skip it and keep scanning
    #[error("undecodable record on line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: DecodeError,
    },

    /// Reading the backing file failed; the scan ends after this item
    #[error("prediction log read failed: {0}")]
    Io(#[from] io::Error),
}

/// Durable, append-only sequence of prediction records
pub struct AppendOnlyLog {
    path: PathBuf,
    /// Longest line accepted on append and on scan
    max_record_len: usize,
    /// Serializes appends from this process
    write_lock: Mutex<()>,
}

impl AppendOnlyLog {
    /// Bind a log to `path`; nothing is touched until the first append
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_record_len: MAX_RECORD_LEN,
            write_lock: Mutex::new(()),
        }
    }

    /// Override the line length cap
    pub fn with_max_record_len(mut self, max_record_len: usize) -> Self {
        self.max_record_len = max_record_len;
        self
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line and sync it before returning.
    ///
    /// Creates the file (and its parent directory) if absent. When the file
    /// ends in a torn line left by an interrupted write, a newline is written
    /// first so the new record starts on its own line.
    pub fn append(&self, record: &PredictionRecord) -> Result<(), StoreError> {
        let line = codec::encode(record)?;
        if line.len() > self.max_record_len {
            return Err(StoreError::TooLarge {
                len: line.len(),
                max: self.max_record_len,
            });
        }
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.unavailable(e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.unavailable(e))?;

        let mut buf = Vec::with_capacity(line.len() + 1);
        if has_torn_tail(&mut file).map_err(|e| self.unavailable(e))? {
            debug!(path = %self.path.display(), "Terminating torn tail before append");
            buf.push(b'\n');
        }
        buf.extend_from_slice(&line);

        file.write_all(&buf).map_err(|e| self.unavailable(e))?;
        file.sync_data().map_err(|e| self.unavailable(e))?;

        Ok(())
    }

    /// Start a forward scan over every line currently in the log.
    ///
    /// A missing file is an empty log. Each call opens the file afresh, so a
    /// scan can be restarted at any time. A final line without its newline is
    /// either still being written or torn, and is never yielded.
    pub fn scan(&self) -> Result<Scan, StoreError> {
        match File::open(&self.path) {
            Ok(file) => Ok(Scan::new(BufReader::new(file), self.max_record_len)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Scan::empty()),
            Err(e) => Err(self.unavailable(e)),
        }
    }

    fn unavailable(&self, source: io::Error) -> StoreError {
        StoreError::Unavailable {
            path: self.path.clone(),
            source,
        }
    }
}

fn has_torn_tail(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Lazy forward scan over the log.
///
/// Yields `Ok(record)` for each decodable line and `Err(ScanFault::Decode)`
/// for each corrupt or overlong one; blank lines are passed over. An I/O
/// error is yielded once as `Err(ScanFault::Io)` and ends the scan.
pub struct Scan {
    reader: Option<BufReader<File>>,
    max_len: usize,
    line: usize,
    buf: Vec<u8>,
}

impl Scan {
    fn new(reader: BufReader<File>, max_len: usize) -> Self {
        Self {
            reader: Some(reader),
            max_len,
            line: 0,
            buf: Vec::new(),
        }
    }

    fn empty() -> Self {
        Self {
            reader: None,
            max_len: MAX_RECORD_LEN,
            line: 0,
            buf: Vec::new(),
        }
    }

    /// Only the decodable records, corrupt lines dropped
    pub fn records(self) -> impl Iterator<Item = PredictionRecord> {
        self.filter_map(|item| match item {
            Ok(record) => Some(record),
            Err(fault) => {
                debug!(error = %fault, "Skipping prediction log entry");
                None
            }
        })
    }
}

impl Iterator for Scan {
    type Item = Result<PredictionRecord, ScanFault>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let reader = self.reader.as_mut()?;
            self.buf.clear();

            let cap = self.max_len as u64 + 1;
            let read = reader.by_ref().take(cap).read_until(b'\n', &mut self.buf);
            match read {
                Ok(0) => {
                    self.reader = None;
                    return None;
                }
                Ok(n) if n > self.max_len => {
                    self.line += 1;
                    let line = self.line;
                    if self.buf.last() != Some(&b'\n') {
                        if let Err(e) = discard_line(reader) {
                            self.reader = None;
                            return Some(Err(ScanFault::Io(e)));
                        }
                    }
                    let source = DecodeError::TooLong { max: self.max_len };
                    return Some(Err(ScanFault::Decode { line, source }));
                }
                Ok(_) if self.buf.last() != Some(&b'\n') => {
                    debug!(bytes = self.buf.len(), "Leaving unterminated tail line");
                    self.reader = None;
                    return None;
                }
                Ok(_) => {
                    self.line += 1;
                    if codec::is_blank(&self.buf) {
                        continue;
                    }
                    let line = self.line;
                    return Some(
                        codec::decode(&self.buf).map_err(|source| ScanFault::Decode { line, source }),
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.reader = None;
                    return Some(Err(ScanFault::Io(e)));
                }
            }
        }
    }
}

/// Skip the rest of the current line, terminator included
fn discard_line<R: BufRead>(reader: &mut R) -> io::Result<()> {
    loop {
        let available = match reader.fill_buf() {
            Ok(available) => available,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::prediction::ScoreOutput;
    use crate::types::transaction::ProcurementTransaction;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(id: &str, vendor: &str, amount: f64) -> PredictionRecord {
        PredictionRecord::new(
            id.to_string(),
            Utc::now(),
            ProcurementTransaction::new(amount, "Land Transport Authority", vendor),
            ScoreOutput {
                risk_score: 20,
                is_anomaly: false,
                fraud_score: None,
                reasons: Vec::new(),
            },
        )
    }

    #[test]
    fn test_missing_file_scans_empty() {
        let dir = TempDir::new().unwrap();
        let log = AppendOnlyLog::new(dir.path().join("absent.jsonl"));

        assert_eq!(log.scan().unwrap().count(), 0);
        assert!(!log.path().exists());
    }

    #[test]
    fn test_append_creates_parent_dir() {
        let dir = TempDir::new().unwrap();
        let log = AppendOnlyLog::new(dir.path().join("nested/data/predictions.jsonl"));

        log.append(&record("PRED-1", "Acme", 10.0)).unwrap();

        let records: Vec<_> = log.scan().unwrap().records().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].prediction_id, "PRED-1");
    }

    #[test]
    fn test_scan_preserves_append_order() {
        let dir = TempDir::new().unwrap();
        let log = AppendOnlyLog::new(dir.path().join("predictions.jsonl"));

        for i in 0..5 {
            log.append(&record(&format!("PRED-{i}"), "Acme", i as f64)).unwrap();
        }

        let ids: Vec<String> = log.scan().unwrap().records().map(|r| r.prediction_id).collect();
        assert_eq!(ids, vec!["PRED-0", "PRED-1", "PRED-2", "PRED-3", "PRED-4"]);
    }

    #[test]
    fn test_corrupt_line_reported_and_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.jsonl");
        let log = AppendOnlyLog::new(&path);

        log.append(&record("PRED-1", "Acme", 1.0)).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{\"prediction_id\": oops\n\n")
            .unwrap();
        log.append(&record("PRED-2", "Acme", 2.0)).unwrap();

        let items: Vec<_> = log.scan().unwrap().collect();
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(ScanFault::Decode { line: 2, .. })));
        assert!(items[2].is_ok());
    }

    #[test]
    fn test_torn_tail_is_isolated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.jsonl");
        let log = AppendOnlyLog::new(&path);

        log.append(&record("PRED-1", "Acme", 1.0)).unwrap();
        let torn = codec::encode(&record("PRED-torn", "Acme", 9.0)).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(&torn[..torn.len() / 2])
            .unwrap();
        log.append(&record("PRED-2", "Acme", 2.0)).unwrap();

        let ids: Vec<String> = log.scan().unwrap().records().map(|r| r.prediction_id).collect();
        assert_eq!(ids, vec!["PRED-1", "PRED-2"]);
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.jsonl");
        let original = record("PRED-1", "Acme", 1.0);

        AppendOnlyLog::new(&path).append(&original).unwrap();

        let reopened = AppendOnlyLog::new(&path);
        let records: Vec<_> = reopened.scan().unwrap().records().collect();
        assert_eq!(records, vec![original]);
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(AppendOnlyLog::new(dir.path().join("predictions.jsonl")));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let vendor = "V".repeat(200 + t * 50);
                        log.append(&record(&format!("PRED-{t}-{i}"), &vendor, i as f64))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let items: Vec<_> = log.scan().unwrap().collect();
        assert_eq!(items.len(), 200);
        assert!(items.iter().all(Result::is_ok));
    }

    #[test]
    fn test_scan_during_appends_sees_whole_records() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(AppendOnlyLog::new(dir.path().join("predictions.jsonl")));

        let expected: Arc<HashMap<String, PredictionRecord>> = Arc::new(
            (0..4)
                .flat_map(|t| (0..100).map(move |i| (t, i)))
                .map(|(t, i)| {
                    let vendor = format!("{}-{}", "V".repeat(300 + t * 700), t);
                    let record = record(&format!("PRED-{t}-{i}"), &vendor, i as f64);
                    (record.prediction_id.clone(), record)
                })
                .collect(),
        );
        let done = Arc::new(AtomicBool::new(false));

        let reader = {
            let log = log.clone();
            let expected = expected.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut passes = 0;
                loop {
                    let finished = done.load(Ordering::Acquire);
                    for item in log.scan().unwrap() {
                        let record = item.unwrap();
                        assert_eq!(expected.get(&record.prediction_id), Some(&record));
                    }
                    passes += 1;
                    if finished {
                        return passes;
                    }
                }
            })
        };

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let log = log.clone();
                let expected = expected.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        log.append(&expected[&format!("PRED-{t}-{i}")]).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::Release);

        assert!(reader.join().unwrap() >= 1);
        assert_eq!(log.scan().unwrap().records().count(), 400);
    }

    #[test]
    fn test_unterminated_tail_not_yielded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.jsonl");
        let log = AppendOnlyLog::new(&path);

        log.append(&record("PRED-1", "Acme", 1.0)).unwrap();
        let mut pending = codec::encode(&record("PRED-2", "Acme", 2.0)).unwrap();
        pending.pop();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(&pending)
            .unwrap();

        let items: Vec<_> = log.scan().unwrap().collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().prediction_id, "PRED-1");
    }

    #[test]
    fn test_overlong_line_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.jsonl");
        let log = AppendOnlyLog::new(&path).with_max_record_len(512);

        log.append(&record("PRED-1", "Acme", 1.0)).unwrap();
        let mut junk = vec![b'x'; 4096];
        junk.push(b'\n');
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(&junk)
            .unwrap();
        log.append(&record("PRED-2", "Acme", 2.0)).unwrap();

        let items: Vec<_> = log.scan().unwrap().collect();
        assert_eq!(items.len(), 3);
        assert!(matches!(
            items[1],
            Err(ScanFault::Decode {
                line: 2,
                source: DecodeError::TooLong { max: 512 }
            })
        ));
        assert_eq!(items[2].as_ref().unwrap().prediction_id, "PRED-2");
    }

    #[test]
    fn test_append_rejects_oversized_record() {
        let dir = TempDir::new().unwrap();
        let log = AppendOnlyLog::new(dir.path().join("predictions.jsonl")).with_max_record_len(512);

        let result = log.append(&record("PRED-1", &"V".repeat(1024), 1.0));

        assert!(matches!(result, Err(StoreError::TooLarge { max: 512, .. })));
        assert_eq!(log.scan().unwrap().count(), 0);
    }
}
