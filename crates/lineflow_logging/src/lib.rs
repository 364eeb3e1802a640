//! Logging and home directory layout for Lineflow binaries.
//!
//! Every run logs to `$LINEFLOW_HOME/logs/<app>.log` (size-rotated) and to
//! stderr. `RUST_LOG` overrides the default filter for both.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable that relocates the Lineflow home directory.
pub const HOME_ENV: &str = "LINEFLOW_HOME";

const DEFAULT_LOG_FILTER: &str = "lineflow=info,lineflow_engine=info,lineflow_db=info,lineflow_intake=warn";
const VERBOSE_LOG_FILTER: &str =
    "lineflow=debug,lineflow_engine=debug,lineflow_db=debug,lineflow_intake=debug";
/// Active file plus archives.
const LOG_GENERATIONS: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Logging setup for one binary.
pub struct LogConfig<'a> {
    /// Names the log file: `<app_name>.log`.
    pub app_name: &'a str,
    /// Debug output on stderr instead of warnings only.
    pub verbose: bool,
}

/// Install the global subscriber: rotating file plus stderr.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = logs_dir();
    let log_file = RotatingFile::open(&log_dir, config.app_name, LOG_GENERATIONS, MAX_LOG_FILE_SIZE)
        .with_context(|| format!("Failed to open log file in {}", log_dir.display()))?;
    let log_file = Mutex::new(log_file);

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // Reports go to stdout; keep stderr quiet unless asked.
    let console_filter = if config.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(VERBOSE_LOG_FILTER))
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(())
}

/// Lineflow home: `$LINEFLOW_HOME`, else `~/.lineflow`, else `./.lineflow`.
pub fn lineflow_home() -> PathBuf {
    match std::env::var(HOME_ENV) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".lineflow"),
    }
}

pub fn logs_dir() -> PathBuf {
    lineflow_home().join("logs")
}

pub fn default_db_path() -> PathBuf {
    lineflow_home().join("lineflow.sqlite3")
}

pub fn config_path() -> PathBuf {
    lineflow_home().join("config.toml")
}

/// `<app>.log`, shifted to `<app>.log.1` and onward once it passes
/// `max_size`. The oldest generation is dropped.
struct RotatingFile {
    base: PathBuf,
    generations: usize,
    max_size: u64,
    file: File,
    written: u64,
}

impl RotatingFile {
    fn open(dir: &Path, app_name: &str, generations: usize, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let base = dir.join(format!("{app_name}.log"));
        let file = append_to(&base)?;
        let written = file.metadata()?.len();
        Ok(Self {
            base,
            generations: generations.max(2),
            max_size,
            file,
            written,
        })
    }

    fn generation(&self, n: usize) -> PathBuf {
        let mut path = self.base.clone().into_os_string();
        path.push(format!(".{n}"));
        PathBuf::from(path)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let oldest = self.generation(self.generations - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for n in (1..self.generations - 1).rev() {
            let from = self.generation(n);
            if from.exists() {
                fs::rename(&from, self.generation(n + 1))?;
            }
        }
        if self.base.exists() {
            fs::rename(&self.base, self.generation(1))?;
        }
        self.file = append_to(&self.base)?;
        self.written = 0;
        Ok(())
    }
}

fn append_to(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rotation_keeps_bounded_archives() {
        let tmp = TempDir::new().unwrap();
        let mut log = RotatingFile::open(tmp.path(), "app", 3, 10).unwrap();

        for _ in 0..5 {
            log.write_all(b"0123456789").unwrap();
        }
        log.flush().unwrap();

        assert!(tmp.path().join("app.log").exists());
        assert!(tmp.path().join("app.log.1").exists());
        assert!(tmp.path().join("app.log.2").exists());
        assert!(!tmp.path().join("app.log.3").exists());
        assert_eq!(fs::read(tmp.path().join("app.log")).unwrap().len(), 10);
    }

    #[test]
    fn test_reopen_appends_to_existing_log() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("app.log"), b"abc").unwrap();
        let mut log = RotatingFile::open(tmp.path(), "app", 3, 100).unwrap();
        log.write_all(b"def").unwrap();
        log.flush().unwrap();

        assert_eq!(fs::read(tmp.path().join("app.log")).unwrap(), b"abcdef");
    }

    #[test]
    fn test_layout_under_home() {
        let home = lineflow_home();
        assert_eq!(logs_dir(), home.join("logs"));
        assert_eq!(default_db_path(), home.join("lineflow.sqlite3"));
        assert_eq!(config_path(), home.join("config.toml"));
    }
}
