use crate::error::{Result, StorageError};
use crate::EventFeed;
use async_trait::async_trait;
use batchwatch_common::types::EventRecord;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};

/// Parses one log line. Blank lines yield `None`.
pub fn parse_line(line: &str, line_no: u64) -> Result<Option<EventRecord>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| StorageError::Parse {
            line: line_no,
            source,
        })
}

/// Parses one raw log line, newline included. Bytes that are not UTF-8 are
/// reported against `line_no` like any other unreadable record.
pub fn decode_line(bytes: &[u8], line_no: u64) -> Result<Option<EventRecord>> {
    let line = std::str::from_utf8(bytes).map_err(|source| StorageError::Encoding {
        line: line_no,
        source,
    })?;
    parse_line(line, line_no)
}

async fn open(path: &Path) -> Result<File> {
    File::open(path).await.map_err(|source| StorageError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a finished event log once, from the first line to the last.
pub struct JsonlReplay {
    path: PathBuf,
    reader: BufReader<File>,
    buf: Vec<u8>,
    line_no: u64,
}

impl JsonlReplay {
    /// # Errors
    ///
    /// [`StorageError::Open`] if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open(&path).await?;
        Ok(Self {
            path,
            reader: BufReader::new(file),
            buf: Vec::new(),
            line_no: 0,
        })
    }

    /// Number of lines consumed so far.
    pub fn line_no(&self) -> u64 {
        self.line_no
    }
}

#[async_trait]
impl EventFeed for JsonlReplay {
    async fn next_event(&mut self) -> Result<Option<EventRecord>> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            if let Some(event) = decode_line(&self.buf, self.line_no)? {
                return Ok(Some(event));
            }
        }
    }

    fn describe(&self) -> String {
        format!("replay of {}", self.path.display())
    }
}

/// Follows an event log that another process is still appending to.
///
/// At end of file the tail sleeps for `poll_interval` and looks again. A
/// line without its trailing newline is held back until the writer finishes
/// it. If the file shrinks (truncated or replaced) reading restarts from the
/// beginning. The feed never ends on its own.
///
/// `next_event` is not cancel safe: dropping it mid-read may lose the line
/// being read. Drive it from a dedicated task.
pub struct JsonlTail {
    path: PathBuf,
    reader: BufReader<File>,
    poll_interval: Duration,
    pending: Vec<u8>,
    position: u64,
    line_no: u64,
}

impl JsonlTail {
    /// Opens `path` and positions the tail at its first line, or at its end
    /// when `from_start` is false.
    ///
    /// # Errors
    ///
    /// [`StorageError::Open`] if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>, poll_interval: Duration, from_start: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = open(&path).await?;
        let position = if from_start {
            0
        } else {
            file.seek(std::io::SeekFrom::End(0)).await?
        };
        Ok(Self {
            path,
            reader: BufReader::new(file),
            poll_interval,
            pending: Vec::new(),
            position,
            line_no: 0,
        })
    }

    async fn reopen_if_truncated(&mut self) -> Result<()> {
        let len = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            // Mid-rotation the path may briefly not exist.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if len < self.position {
            tracing::info!(
                path = %self.path.display(),
                position = self.position,
                len,
                "Event log shrank, reading from the start"
            );
            self.reader = BufReader::new(open(&self.path).await?);
            self.position = 0;
            self.pending.clear();
        }
        Ok(())
    }
}

#[async_trait]
impl EventFeed for JsonlTail {
    async fn next_event(&mut self) -> Result<Option<EventRecord>> {
        loop {
            let read = self.reader.read_until(b'\n', &mut self.pending).await?;
            self.position += read as u64;

            if self.pending.last() != Some(&b'\n') {
                if read == 0 {
                    self.reopen_if_truncated().await?;
                }
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            self.line_no += 1;
            let line = std::mem::take(&mut self.pending);
            if let Some(event) = decode_line(&line, self.line_no)? {
                return Ok(Some(event));
            }
        }
    }

    fn describe(&self) -> String {
        format!("tail of {}", self.path.display())
    }
}

/// Appends records to an event log, one JSON object per line.
pub struct EventLogWriter {
    file: File,
}

impl EventLogWriter {
    /// Opens `path` for appending, creating it and its parent directory if
    /// needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| StorageError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { file })
    }

    /// Writes `event` as a single line and flushes it.
    pub async fn append(&mut self, event: &EventRecord) -> Result<()> {
        let mut line = serde_json::to_string(event).map_err(StorageError::Encode)?;
        line.push('\n');
        self.file.write_all(line.as_bytes()).await?;
        self.file.flush().await?;
        Ok(())
    }
}
