//! A per-server log file writer rotated by size and age (§4.3).
//!
//! `tracing-appender`'s built-in rollers rotate by age alone; the
//! Upstream Client also needs a size cap so one noisy subprocess can't
//! fill the disk between daily rotations. This is a small
//! `std::io::Write` implementation, not a `tracing` layer, so a client
//! can use it directly for the raw stdout/stderr bytes of a subprocess
//! as well as for structured log lines.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Rotates `path` to `path.<unix-timestamp>` once it exceeds
/// `max_bytes`, or once a day has elapsed since the file was opened,
/// whichever comes first.
pub struct SizeRotatingWriter {
    path: PathBuf,
    max_bytes: u64,
    file: File,
    written: u64,
    opened_at: std::time::Instant,
    max_age: std::time::Duration,
}

impl SizeRotatingWriter {
    /// Opens (creating if needed) the log file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or its parent
    /// directory cannot be created.
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, max_age: std::time::Duration) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            path,
            max_bytes,
            file,
            written,
            opened_at: std::time::Instant::now(),
            max_age,
        })
    }

    fn should_rotate(&self, incoming: usize) -> bool {
        self.written + incoming as u64 > self.max_bytes || self.opened_at.elapsed() >= self.max_age
    }

    fn rotate(&mut self) -> io::Result<()> {
        let timestamp = chrono::Utc::now().timestamp();
        let rotated: PathBuf = rotated_path(&self.path, timestamp);
        // Best-effort: a failed rename (e.g. cross-device) just means
        // we keep appending to the same file rather than losing logs.
        let _ = std::fs::rename(&self.path, &rotated);
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.written = 0;
        self.opened_at = std::time::Instant::now();
        Ok(())
    }
}

fn rotated_path(path: &Path, timestamp: i64) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_owned());
    name.push('.');
    name.push_str(&timestamp.to_string());
    path.with_file_name(name)
}

impl Write for SizeRotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.should_rotate(buf.len()) {
            self.rotate()?;
        }
        let written = self.file.write(buf)?;
        self.written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_once_size_cap_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gh.log");
        let mut writer = SizeRotatingWriter::open(&path, 8, std::time::Duration::from_secs(3600)).unwrap();

        writer.write_all(b"1234567890").unwrap();
        writer.flush().unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(entries.len() >= 1);
        assert!(path.exists());
    }

    #[test]
    fn appends_within_cap_without_rotating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gh.log");
        let mut writer = SizeRotatingWriter::open(&path, 1024, std::time::Duration::from_secs(3600)).unwrap();
        writer.write_all(b"hello").unwrap();
        writer.write_all(b"world").unwrap();
        writer.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "helloworld");
    }
}
