//! Append-only JSONL mirror of committed records.
//!
//! A best-effort debugging aid: every committed snapshot becomes one line.
//! The file is never read back, so a failed write only logs.
//!
//! Commits happen under request handlers, so the store only serializes the
//! snapshot and hands the line to a writer task.  The writer drains whatever
//! has queued up and appends it in one `spawn_blocking` call, keeping file
//! I/O off the async workers and lines in commit order.

use std::path::{Path, PathBuf};

use tokio::sync::{mpsc, oneshot};

use ps_domain::error::{Error, Result};
use ps_domain::record::RequestRecord;

enum MirrorOp {
    Line(String),
    Flush(oneshot::Sender<()>),
}

pub struct RecordMirror {
    tx: mpsc::UnboundedSender<MirrorOp>,
}

impl RecordMirror {
    /// Prepare the mirror, creating the parent directory if needed, and
    /// start its writer task.  Must be called inside a tokio runtime.
    pub fn new(path: &Path) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Other(format!("record mirror needs a tokio runtime: {e}")))?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(Error::Io)?;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(run_writer(path.to_path_buf(), rx));
        tracing::info!(path = %path.display(), "record mirror enabled");
        Ok(Self { tx })
    }

    /// Queue one snapshot.  Never blocks.
    pub fn append(&self, record: &RequestRecord) {
        let mut line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(request_id = %record.request_id, error = %e, "record mirror serialize failed");
                return;
            }
        };
        line.push('\n');
        if self.tx.send(MirrorOp::Line(line)).is_err() {
            tracing::warn!(request_id = %record.request_id, "record mirror writer gone, snapshot dropped");
        }
    }

    /// Resolve once every snapshot queued before this call is on disk (or
    /// its write has failed and been logged).
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(MirrorOp::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run_writer(path: PathBuf, mut rx: mpsc::UnboundedReceiver<MirrorOp>) {
    let mut batch = String::new();
    let mut waiters: Vec<oneshot::Sender<()>> = Vec::new();

    while let Some(op) = rx.recv().await {
        let mut next = Some(op);
        while let Some(op) = next {
            match op {
                MirrorOp::Line(line) => batch.push_str(&line),
                MirrorOp::Flush(done) => waiters.push(done),
            }
            next = rx.try_recv().ok();
        }

        if !batch.is_empty() {
            let buf = std::mem::take(&mut batch);
            let target = path.clone();
            let result = tokio::task::spawn_blocking(move || append_lines(&target, &buf))
                .await
                .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))
                .and_then(|r| r);
            if let Err(e) = result {
                tracing::warn!(path = %path.display(), error = %e, "record mirror append failed");
            }
        }

        for done in waiters.drain(..) {
            let _ = done.send(());
        }
    }
}

fn append_lines(path: &Path, buf: &str) -> Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(Error::Io)?;
    file.write_all(buf.as_bytes()).map_err(Error::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn appends_one_line_per_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.jsonl");
        let mirror = RecordMirror::new(&path).unwrap();

        let record = RequestRecord::new("r1", "u1", "선충", Utc::now(), Duration::minutes(1));
        mirror.append(&record);
        mirror.append(&record);
        mirror.flush().await;

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: RequestRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.request_id, "r1");
    }

    #[test]
    fn requires_a_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let result = RecordMirror::new(&dir.path().join("records.jsonl"));
        assert!(matches!(result, Err(Error::Other(_))));
    }

    #[tokio::test]
    async fn unwritable_path_only_logs() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes every open fail.
        let path = dir.path().join("records.jsonl");
        std::fs::create_dir_all(&path).unwrap();
        let mirror = RecordMirror::new(&path).unwrap();

        let record = RequestRecord::new("r1", "u1", "선충", Utc::now(), Duration::minutes(1));
        mirror.append(&record);
        mirror.flush().await;
        mirror.append(&record);
        mirror.flush().await;
    }
}
