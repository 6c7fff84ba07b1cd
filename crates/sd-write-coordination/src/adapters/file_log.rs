//! # File Request Log
//!
//! Append-only, checksummed request log in a single file.
//!
//! ## Frame Layout
//!
//! ```text
//! ┌──────────┬──────────┬──────────────────────────┐
//! │ len: u32 │ crc: u32 │ packed envelope (len B)  │
//! └──────────┴──────────┴──────────────────────────┘
//!   little-endian, crc32 over the packed bytes
//! ```
//!
//! Every append is followed by `sync_data`. On open the file is replayed
//! and cut back to the last complete frame, so a crash mid-append loses
//! at most the entry that was being written. The directory is held with an
//! exclusive `fs2` lock while open.

use crate::error::{LogError, LogResult};
use crate::ports::outbound::RequestLog;
use fs2::FileExt;
use parking_lot::Mutex;
use shared_types::{LogId, RequestEnvelope};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const FRAME_HEADER_LEN: u64 = 8;

/// Position of one frame in the data file.
#[derive(Clone, Copy, Debug)]
struct FrameIndex {
    inc_id: LogId,
    offset: u64,
    len: u32,
}

struct OpenLog {
    data: File,
    lock: File,
    index: Vec<FrameIndex>,
    end: u64,
}

impl Drop for OpenLog {
    fn drop(&mut self) {
        let _ = self.lock.unlock();
    }
}

/// File-backed `RequestLog`.
pub struct FileRequestLog {
    dir: PathBuf,
    inner: Mutex<Option<OpenLog>>,
}

impl FileRequestLog {
    const DATA_FILE: &'static str = "reqlog.dat";
    const LOCK_FILE: &'static str = "LOCK";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            inner: Mutex::new(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Release the directory lock. `open` may be called again afterward.
    pub fn close(&self) {
        *self.inner.lock() = None;
    }

    fn acquire_lock(&self) -> LogResult<File> {
        let path = self.dir.join(Self::LOCK_FILE);
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        lock.try_lock_exclusive()
            .map_err(|_| LogError::Locked { path })?;
        Ok(lock)
    }

    /// Parse frames until the first incomplete or corrupt one.
    ///
    /// Returns the index and the offset where the valid prefix ends.
    fn replay(bytes: &[u8]) -> (Vec<FrameIndex>, u64) {
        let mut index = Vec::new();
        let mut pos = 0usize;

        while let Some(header) = bytes.get(pos..pos + FRAME_HEADER_LEN as usize) {
            let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
            let start = pos + FRAME_HEADER_LEN as usize;
            let Some(payload) = bytes.get(start..start + len as usize) else {
                break;
            };
            if crc32fast::hash(payload) != crc {
                warn!(offset = pos, "Request log frame failed checksum");
                break;
            }
            let Ok(envelope) = RequestEnvelope::unpack(payload) else {
                warn!(offset = pos, "Request log frame does not decode");
                break;
            };
            let expected = LogId::after(index.last().map(|f: &FrameIndex| f.inc_id));
            if envelope.inc_id != expected {
                warn!(offset = pos, got = %envelope.inc_id, %expected, "Request log id gap");
                break;
            }
            index.push(FrameIndex {
                inc_id: envelope.inc_id,
                offset: pos as u64,
                len,
            });
            pos = start + len as usize;
        }

        (index, pos as u64)
    }

    fn read_frame(data: &mut File, frame: FrameIndex) -> LogResult<RequestEnvelope> {
        let mut header = [0u8; FRAME_HEADER_LEN as usize];
        data.seek(SeekFrom::Start(frame.offset))?;
        data.read_exact(&mut header)?;
        let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let mut payload = vec![0u8; frame.len as usize];
        data.read_exact(&mut payload)?;
        if crc32fast::hash(&payload) != crc {
            return Err(LogError::Corrupt {
                offset: frame.offset,
            });
        }
        Ok(RequestEnvelope::unpack(&payload)?)
    }
}

impl RequestLog for FileRequestLog {
    fn open(&self) -> LogResult<()> {
        let mut inner = self.inner.lock();
        if inner.is_some() {
            return Ok(());
        }

        fs::create_dir_all(&self.dir)?;
        let lock = self.acquire_lock()?;

        let path = self.dir.join(Self::DATA_FILE);
        let mut data = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        let mut bytes = Vec::new();
        data.read_to_end(&mut bytes)?;
        let (index, end) = Self::replay(&bytes);

        if end < bytes.len() as u64 {
            warn!(
                path = %path.display(),
                valid = end,
                total = bytes.len(),
                "Truncating torn tail of request log"
            );
            data.set_len(end)?;
            data.sync_all()?;
        }

        info!(
            path = %path.display(),
            entries = index.len(),
            last = ?index.last().map(|f| f.inc_id),
            "Request log opened"
        );

        *inner = Some(OpenLog {
            data,
            lock,
            index,
            end,
        });
        Ok(())
    }

    fn append(&self, envelope: &RequestEnvelope) -> LogResult<LogId> {
        let mut inner = self.inner.lock();
        let log = inner.as_mut().ok_or(LogError::NotOpen)?;

        let last = log.index.last().map(|f| f.inc_id);
        if envelope.inc_id != LogId::after(last) {
            return Err(LogError::OutOfOrder {
                last,
                got: envelope.inc_id,
            });
        }

        let payload = envelope.pack()?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            LogError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "envelope larger than 4 GiB",
            ))
        })?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN as usize + payload.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);

        log.data.seek(SeekFrom::Start(log.end))?;
        if let Err(e) = log.data.write_all(&frame).and_then(|()| log.data.sync_data()) {
            // Drop whatever part of the frame reached the file.
            let _ = log.data.set_len(log.end);
            return Err(e.into());
        }

        log.index.push(FrameIndex {
            inc_id: envelope.inc_id,
            offset: log.end,
            len,
        });
        log.end += frame.len() as u64;

        debug!(inc_id = %envelope.inc_id, bytes = frame.len(), "Request log append");
        Ok(envelope.inc_id)
    }

    fn read_from(&self, from: LogId) -> LogResult<Vec<RequestEnvelope>> {
        let mut inner = self.inner.lock();
        let log = inner.as_mut().ok_or(LogError::NotOpen)?;

        let start = log.index.partition_point(|f| f.inc_id < from);
        let frames: Vec<FrameIndex> = log.index[start..].to_vec();
        frames
            .into_iter()
            .map(|frame| Self::read_frame(&mut log.data, frame))
            .collect()
    }

    fn last_log_id(&self) -> Option<LogId> {
        self.inner
            .lock()
            .as_ref()
            .and_then(|log| log.index.last().map(|f| f.inc_id))
    }
}
