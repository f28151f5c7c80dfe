//! Daily plain-text connection log: one line per connection event,
//! rotated by calendar day, format `TIMESTAMP | SERVICE | USER | IP |
//! STATUS`.
//!
//! This is deliberately a flat-file audit trail rather than structured
//! `tracing` output (which still happens separately) — a human-greppable
//! log operators can point `tail -f` at without a log aggregator.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct ConnectionLog {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ConnectionLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path_for_today(&self) -> PathBuf {
        let date = Utc::now().format("%Y-%m-%d");
        self.dir.join(format!("connections_{date}.log"))
    }

    /// Appends one line. Failures are logged via `tracing` and otherwise
    /// swallowed: a disk-full connection log must never take down a
    /// session (mirrors the original's best-effort file logging).
    pub async fn record(&self, service: &str, user: &str, ip: &str, status: &str) {
        let _guard = self.write_lock.lock().await;
        if let Err(err) = self.try_record(service, user, ip, status).await {
            tracing::warn!(%err, "failed to write connection log entry");
        }
    }

    async fn try_record(
        &self,
        service: &str,
        user: &str,
        ip: &str,
        status: &str,
    ) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for_today();
        let line = format!(
            "{} | {} | {} | {} | {}\n",
            Utc::now().to_rfc3339(),
            service,
            user,
            ip,
            status
        );
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    #[cfg(test)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_one_pipe_delimited_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let log = ConnectionLog::new(dir.path());
        log.record("screen", "alice", "127.0.0.1", "connected").await;
        log.record("screen", "alice", "127.0.0.1", "disconnected").await;

        let path = log.path_for_today();
        let contents = tokio::fs::read_to_string(path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("screen"));
        assert!(lines[0].contains("alice"));
        assert!(lines[0].contains("connected"));
        assert_eq!(lines[0].split(" | ").count(), 5);
    }
}
