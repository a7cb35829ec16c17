//! Append-only event log on disk.
//!
//! Layout of `events.log`:
//! ```text
//! header   : magic "CHLOG\0\0\0" | u32 version | u32 flags      (16 bytes)
//! frame*   : u32 payload_len | u32 crc32(payload) | payload     (one per batch)
//! payload  : JSON array of StoredRow
//! ```
//! A batch is durable once its frame is written and synced. A frame that is
//! short or fails its checksum can only be the tail of an interrupted write,
//! so it is truncated away on open.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use parking_lot::{Mutex, RwLock};

#[cfg(feature = "mmap")]
use memmap2::Mmap;

use crate::config::LogConfig;
use crate::error::{LogError, Result};
use crate::region::Region;

use super::io_utils::{classify_io_error, RetryPolicy};
use super::row::StoredRow;
use super::table::RowTable;
use super::RowStore;

const LOG_MAGIC: [u8; 8] = *b"CHLOG\x00\x00\x00";
const LOG_VERSION: u32 = 1;
const HEADER_SIZE: usize = 16;
const FRAME_HEADER_SIZE: usize = 8;

/// Outcome of scanning a log file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogReport {
    /// Committed batches found
    pub batches: usize,
    /// Rows across all committed batches
    pub rows: usize,
    /// Bytes up to the end of the last intact frame
    pub valid_bytes: u64,
    /// File size
    pub total_bytes: u64,
    /// Why scanning stopped before the end of the file, if it did
    pub problem: Option<String>,
}

impl LogReport {
    pub fn is_clean(&self) -> bool {
        self.problem.is_none()
    }
}

struct FrameScan {
    batches: Vec<Vec<StoredRow>>,
    valid_len: usize,
    problem: Option<String>,
}

struct LogWriter {
    file: File,
    len: u64,
}

/// Durable row store backed by a single append-only file.
pub struct FileRowStore {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    table: RwLock<RowTable>,
    sync_on_commit: bool,
    retry: RetryPolicy,
}

impl std::fmt::Debug for FileRowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRowStore")
            .field("path", &self.path)
            .field("rows", &self.row_count())
            .finish()
    }
}

impl FileRowStore {
    /// Opens or creates the event log in `config.data_dir`, replaying committed batches.
    pub fn open(config: &LogConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)
            .map_err(|e| classify_io_error(e, "Failed to create data directory"))?;
        let path = config.log_path();

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| classify_io_error(e, "Failed to open event log"))?;

        let scan = with_log_bytes(&file, scan_frames)?;

        if let Some(problem) = &scan.problem {
            tracing::warn!(
                "Truncating event log {} at byte {}: {}",
                path.display(),
                scan.valid_len,
                problem
            );
            file.set_len(scan.valid_len as u64)
                .map_err(|e| classify_io_error(e, "Failed to truncate event log"))?;
        }

        let mut writer = LogWriter {
            file,
            len: scan.valid_len as u64,
        };
        if writer.len == 0 {
            write_header(&mut writer)?;
        }

        let mut table = RowTable::new();
        let batches = scan.batches.len();
        for batch in scan.batches {
            table.commit(batch);
        }
        tracing::info!(
            "Opened event log {} ({} batches, {} rows)",
            path.display(),
            batches,
            table.len()
        );

        Ok(Self {
            path,
            writer: Mutex::new(writer),
            table: RwLock::new(table),
            sync_on_commit: config.sync_on_commit,
            retry: RetryPolicy::from_config(config),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scans a log file without opening it for writing or repairing it.
    pub fn verify(path: impl AsRef<Path>) -> Result<LogReport> {
        let file = File::open(path.as_ref())
            .map_err(|e| classify_io_error(e, "Failed to open event log"))?;
        let total_bytes = file
            .metadata()
            .map_err(|e| classify_io_error(e, "Failed to stat event log"))?
            .len();
        let scan = with_log_bytes(&file, scan_frames)?;
        Ok(LogReport {
            batches: scan.batches.len(),
            rows: scan.batches.iter().map(Vec::len).sum(),
            valid_bytes: scan.valid_len as u64,
            total_bytes,
            problem: scan.problem,
        })
    }

    fn write_frame(&self, writer: &mut LogWriter, frame: &[u8]) -> Result<()> {
        let start = writer.len;
        let written = writer.file.write_all(frame).and_then(|_| {
            if self.sync_on_commit {
                writer.file.sync_data()
            } else {
                Ok(())
            }
        });
        match written {
            Ok(()) => {
                writer.len += frame.len() as u64;
                Ok(())
            }
            Err(e) => {
                // Drop whatever part of the frame reached the file.
                if let Err(truncate_err) = writer.file.set_len(start) {
                    tracing::error!(
                        "Failed to roll back partial frame in {}: {}",
                        self.path.display(),
                        truncate_err
                    );
                }
                Err(classify_io_error(e, "Failed to append batch"))
            }
        }
    }
}

impl RowStore for FileRowStore {
    fn append_rows(&self, mut rows: Vec<StoredRow>) -> Result<Range<u64>> {
        let mut writer = self.writer.lock();
        let ids = self.table.read().assign_ids(&mut rows);
        if rows.is_empty() {
            return Ok(ids);
        }

        let frame = encode_frame(&rows)?;
        self.retry
            .run("append_rows", || self.write_frame(&mut writer, &frame))?;

        self.table.write().commit(rows);
        Ok(ids)
    }

    fn scan(&self, region: &Region, limit: usize) -> Result<Vec<StoredRow>> {
        Ok(self.table.read().scan(region, limit))
    }

    fn row_count(&self) -> usize {
        self.table.read().len()
    }

    fn next_event_id(&self) -> u64 {
        self.table.read().next_event_id()
    }
}

fn write_header(writer: &mut LogWriter) -> Result<()> {
    let mut header = Vec::with_capacity(HEADER_SIZE);
    header.extend_from_slice(&LOG_MAGIC);
    header.extend_from_slice(&LOG_VERSION.to_le_bytes());
    header.extend_from_slice(&0u32.to_le_bytes());
    writer
        .file
        .write_all(&header)
        .and_then(|_| writer.file.sync_all())
        .map_err(|e| classify_io_error(e, "Failed to write event log header"))?;
    writer.len = HEADER_SIZE as u64;
    Ok(())
}

fn encode_frame(rows: &[StoredRow]) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(rows)?;
    let len = u32::try_from(payload.len()).map_err(|_| {
        LogError::InvalidInput(format!("batch of {} bytes is too large", payload.len()))
    })?;
    let mut hasher = Hasher::new();
    hasher.update(&payload);

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&hasher.finalize().to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

fn scan_frames(bytes: &[u8]) -> Result<FrameScan> {
    let mut scan = FrameScan {
        batches: Vec::new(),
        valid_len: 0,
        problem: None,
    };
    if bytes.is_empty() {
        return Ok(scan);
    }
    if bytes.len() < HEADER_SIZE {
        scan.problem = Some("truncated file header".to_string());
        return Ok(scan);
    }
    if bytes[..8] != LOG_MAGIC {
        return Err(LogError::DataCorruption(
            "event log has an invalid magic number".to_string(),
        ));
    }
    let version = read_u32(bytes, 8);
    if version != LOG_VERSION {
        return Err(LogError::DataCorruption(format!(
            "unsupported event log version {}",
            version
        )));
    }

    let mut offset = HEADER_SIZE;
    while offset < bytes.len() {
        let remaining = bytes.len() - offset;
        if remaining < FRAME_HEADER_SIZE {
            scan.problem = Some(format!("torn frame header at byte {}", offset));
            break;
        }
        let len = read_u32(bytes, offset) as usize;
        let expected_crc = read_u32(bytes, offset + 4);
        let body_start = offset + FRAME_HEADER_SIZE;
        if bytes.len() - body_start < len {
            scan.problem = Some(format!("torn frame at byte {}", offset));
            break;
        }
        let payload = &bytes[body_start..body_start + len];

        let mut hasher = Hasher::new();
        hasher.update(payload);
        if hasher.finalize() != expected_crc {
            scan.problem = Some(format!("checksum mismatch in frame at byte {}", offset));
            break;
        }
        match serde_json::from_slice::<Vec<StoredRow>>(payload) {
            Ok(rows) => scan.batches.push(rows),
            Err(e) => {
                scan.problem = Some(format!("undecodable frame at byte {}: {}", offset, e));
                break;
            }
        }
        offset = body_start + len;
    }
    scan.valid_len = offset;
    Ok(scan)
}

#[cfg(feature = "mmap")]
fn with_log_bytes<T>(file: &File, f: impl FnOnce(&[u8]) -> Result<T>) -> Result<T> {
    let len = file
        .metadata()
        .map_err(|e| classify_io_error(e, "Failed to stat event log"))?
        .len();
    if len == 0 {
        return f(&[]);
    }
    let mmap = unsafe {
        Mmap::map(file).map_err(|e| {
            LogError::IoError(format!("Failed to memory map event log: {}", e))
        })?
    };
    f(&mmap)
}

#[cfg(not(feature = "mmap"))]
fn with_log_bytes<T>(file: &File, f: impl FnOnce(&[u8]) -> Result<T>) -> Result<T> {
    use std::io::Read;

    let mut bytes = Vec::new();
    let mut reader = file;
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| classify_io_error(e, "Failed to read event log"))?;
    f(&bytes)
}
