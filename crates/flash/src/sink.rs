//! Output destinations for encoded entries

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use url::Url;

/// A named, shareable destination. Clones write to the same underlying writer.
#[derive(Clone)]
pub struct Sink {
    name: String,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink").field("name", &self.name).finish()
    }
}

impl Sink {
    /// Wrap an arbitrary writer
    pub fn writer(name: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        Self {
            name: name.into(),
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::writer("stdout", io::stdout())
    }

    pub fn stderr() -> Self {
        Self::writer("stderr", io::stderr())
    }

    /// Append to a file, creating it and its parent directories if needed
    pub fn file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::writer(path.display().to_string(), file))
    }

    /// Rolling file described by `config`; rotation is handled by
    /// `tracing-appender`
    pub fn rolling_file(config: &FileConfig) -> Result<Self> {
        let (dir, prefix) = config.split_path()?;
        std::fs::create_dir_all(&dir)?;

        let mut builder = RollingFileAppender::builder()
            .rotation(config.rotation.into())
            .filename_prefix(prefix);
        if let Some(max_files) = config.max_files {
            builder = builder.max_log_files(max_files);
        }

        let appender = builder.build(&dir).map_err(|e| Error::Sink {
            message: format!(
                "Failed to create rolling file sink '{}': {}",
                config.path.display(),
                e
            ),
        })?;

        Ok(Self::writer(config.path.display().to_string(), appender))
    }

    /// Parse a sink URI: `stdout`, `stderr`, `file:///absolute/path` or a
    /// plain file path
    pub fn parse(uri: &str) -> Result<Self> {
        match uri {
            "stdout" => return Ok(Self::stdout()),
            "stderr" => return Ok(Self::stderr()),
            "" => {
                return Err(Error::Sink {
                    message: "empty sink URI".to_string(),
                })
            }
            _ => {}
        }

        match Url::parse(uri) {
            // single letter schemes are Windows drive letters
            Ok(url) if url.scheme().len() > 1 => match url.scheme() {
                "file" => {
                    let path = url.to_file_path().map_err(|_| Error::Sink {
                        message: format!("invalid file sink URI '{}'", uri),
                    })?;
                    Self::file(path)
                }
                scheme => Err(Error::Sink {
                    message: format!("unsupported sink scheme '{}' in '{}'", scheme, uri),
                }),
            },
            _ => Self::file(uri),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        let mut writer = self.lock()?;
        writer.write_all(buf)
    }

    pub fn flush(&self) -> io::Result<()> {
        let mut writer = self.lock()?;
        writer.flush()
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, Box<dyn Write + Send>>> {
        self.writer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "sink lock poisoned"))
    }
}

/// How often a file sink starts a new file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRotation {
    /// Single file at exactly the configured path
    #[default]
    Never,
    Minutely,
    Hourly,
    Daily,
}

impl From<FileRotation> for Rotation {
    fn from(rotation: FileRotation) -> Self {
        match rotation {
            FileRotation::Never => Rotation::NEVER,
            FileRotation::Minutely => Rotation::MINUTELY,
            FileRotation::Hourly => Rotation::HOURLY,
            FileRotation::Daily => Rotation::DAILY,
        }
    }
}

/// Configuration for logging into a file. Rotated files get a date suffix;
/// `max_files` bounds how many are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub rotation: FileRotation,
    #[serde(default)]
    pub max_files: Option<usize>,
}

impl FileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rotation: FileRotation::Never,
            max_files: None,
        }
    }

    pub fn with_rotation(mut self, rotation: FileRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = Some(max_files);
        self
    }

    /// Directory and file name of the configured path
    fn split_path(&self) -> Result<(PathBuf, String)> {
        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::Config {
                message: format!("file sink path '{}' has no file name", self.path.display()),
            })?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok((dir, file_name.to_string()))
    }
}

/// In-memory sink for tests and diagnostics. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far
    pub fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).to_string()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.lock().map(|b| b.is_empty()).unwrap_or(true)
    }

    pub fn reset(&self) {
        self.buf.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Parse every line as a JSON object
    pub fn parse_json(&self) -> Result<Vec<serde_json::Value>> {
        self.lines()
            .iter()
            .map(|line| serde_json::from_str(line).map_err(Error::from))
            .collect()
    }

    /// A sink writing into this buffer
    pub fn sink(&self) -> Sink {
        Sink::writer("memory", self.clone())
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory sink poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl From<MemorySink> for Sink {
    fn from(memory: MemorySink) -> Self {
        memory.sink()
    }
}
