//! Append-only log tailing with a lifecycle tied to the watching session.
//!
//! A watch covers one directory recursively and streams newly appended
//! complete lines from every file with the recognized suffix. Content that
//! predates the watch is skipped via per-file byte cursors snapshotted at
//! watch start. Closing the tail stops the directory watcher and the reader
//! task deterministically; a line already in flight may still be delivered,
//! but no new read attempts are initiated.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use walkdir::WalkDir;

const EVENT_BUFFER_SIZE: usize = 128;
const LINE_BUFFER_SIZE: usize = 256;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("log directory {} is not accessible", .0.display())]
    MissingDirectory(PathBuf),

    #[error("failed to start file watcher: {0}")]
    Init(#[from] notify::Error),
}

/// Factory for log tails, configured once from the watch section.
pub struct LogWatcher {
    suffix: String,
}

impl LogWatcher {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// Start watching `dir`. Fails synchronously when the directory is
    /// missing or the platform watcher cannot be created; the caller falls
    /// back to timeout-based completion.
    pub fn watch(&self, dir: &Path) -> Result<LogTail, WatchError> {
        if !dir.is_dir() {
            return Err(WatchError::MissingDirectory(dir.to_path_buf()));
        }

        // Cursors start at the current length of every known log file so
        // content written before the watch never reaches the subscriber.
        let mut offsets: HashMap<PathBuf, u64> = HashMap::new();
        for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
            if entry.file_type().is_file()
                && has_suffix(entry.path(), &self.suffix)
                && let Ok(meta) = entry.metadata()
            {
                offsets.insert(entry.path().to_path_buf(), meta.len());
            }
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER_SIZE);
        let mut watcher = notify::recommended_watcher(move |res| {
            if event_tx.blocking_send(res).is_err() {
                // Tail closed; the watcher is about to be dropped.
            }
        })?;
        watcher.watch(dir, RecursiveMode::Recursive)?;

        let (line_tx, line_rx) = mpsc::channel(LINE_BUFFER_SIZE);
        let cancel = CancellationToken::new();
        let reader = ReaderTask {
            suffix: self.suffix.clone(),
            offsets,
            event_rx,
            line_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(reader.run());

        Ok(LogTail {
            lines: line_rx,
            cancel,
            _watcher: watcher,
        })
    }
}

/// Handle to one active log watch. Dropping it closes the watch.
#[derive(Debug)]
pub struct LogTail {
    lines: mpsc::Receiver<String>,
    cancel: CancellationToken,
    _watcher: RecommendedWatcher,
}

impl LogTail {
    /// Next appended line; `None` once the tail is closed and drained.
    pub async fn recv(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    /// Stop the watch. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for LogTail {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct ReaderTask {
    suffix: String,
    offsets: HashMap<PathBuf, u64>,
    event_rx: mpsc::Receiver<Result<notify::Event, notify::Error>>,
    line_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl ReaderTask {
    async fn run(mut self) {
        loop {
            tokio::select! {
                // Cancellation wins over queued events: close() means no
                // new read attempts, even for events already delivered.
                biased;
                _ = self.cancel.cancelled() => break,
                incoming = self.event_rx.recv() => {
                    match incoming {
                        Some(Ok(event)) => {
                            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                                continue;
                            }
                            for path in event.paths {
                                if !has_suffix(&path, &self.suffix) {
                                    continue;
                                }
                                if !self.drain_appended(&path).await {
                                    return;
                                }
                            }
                        }
                        Some(Err(err)) => {
                            warn!("watcher error: {err:?}");
                        }
                        None => break,
                    }
                }
            }
        }
    }

    /// Read newly appended complete lines from `path` and forward them.
    /// Returns `false` when the subscriber is gone.
    async fn drain_appended(&mut self, path: &Path) -> bool {
        let offset = self.offsets.get(path).copied().unwrap_or(0);

        let mut file = match File::open(path).await {
            Ok(file) => file,
            // Removed or unreadable between event and read; skip quietly.
            Err(_) => return true,
        };

        let len = match file.metadata().await {
            Ok(meta) => meta.len(),
            Err(_) => return true,
        };

        // Truncated or rotated in place: start over from the beginning.
        let offset = if len < offset { 0 } else { offset };
        if len == offset {
            return true;
        }

        if file.seek(SeekFrom::Start(offset)).await.is_err() {
            return true;
        }
        let mut buf = Vec::with_capacity((len - offset) as usize);
        if file.read_to_end(&mut buf).await.is_err() {
            return true;
        }

        // Only consume up to the last newline; a trailing partial line stays
        // on disk until the next append completes it.
        let Some(last_newline) = buf.iter().rposition(|&b| b == b'\n') else {
            return true;
        };
        let consumed = &buf[..=last_newline];
        self.offsets
            .insert(path.to_path_buf(), offset + consumed.len() as u64);

        for raw in consumed.split(|&b| b == b'\n') {
            let line = String::from_utf8_lossy(raw).trim_end_matches('\r').to_string();
            if line.is_empty() {
                continue;
            }
            debug!("tailed line from {}", path.display());
            if self.line_tx.send(line).await.is_err() {
                return false;
            }
        }
        true
    }
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(suffix))
}
