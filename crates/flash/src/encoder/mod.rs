//! Entry encoders
//!
//! An [`Encoder`] turns an [`Entry`] plus its structured fields into the bytes
//! written to a sink. Encoders carry context fields of their own: a new logging
//! context (a span) clones its parent's encoder and adds its fields to the clone.

mod console;
mod json;
mod logfmt;
mod skip;

pub use console::ConsoleEncoder;
pub use json::JsonEncoder;
pub use logfmt::LogFmtEncoder;
pub use skip::{new_skip_encoder, SkipEncoder};

use crate::field::{Entry, Field};
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::Level;

/// Capability set of an entry encoder
pub trait Encoder: Send + Sync {
    /// Serialize an entry and its fields, context fields included
    fn encode_entry(&self, entry: &Entry, fields: &[Field]) -> Result<Vec<u8>>;

    /// Copy of this encoder for use in a new logging context
    fn clone_encoder(&self) -> Box<dyn Encoder>;

    /// Attach context fields emitted with every subsequent entry
    fn add_fields(&mut self, fields: &[Field]);
}

impl Encoder for Box<dyn Encoder> {
    fn encode_entry(&self, entry: &Entry, fields: &[Field]) -> Result<Vec<u8>> {
        (**self).encode_entry(entry, fields)
    }

    fn clone_encoder(&self) -> Box<dyn Encoder> {
        (**self).clone_encoder()
    }

    fn add_fields(&mut self, fields: &[Field]) {
        (**self).add_fields(fields)
    }
}

impl Clone for Box<dyn Encoder> {
    fn clone(&self) -> Self {
        self.clone_encoder()
    }
}

/// Factory producing an encoder from a configuration
pub type NewEncoderFn = fn(EncoderConfig) -> Box<dyn Encoder>;

/// Supported output encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderType {
    /// Tab-separated, human-readable lines
    Console,
    /// One JSON object per line
    Json,
    /// `key=value` pairs
    LogFmt,
}

impl EncoderType {
    /// Factory for this encoding
    pub fn factory(self) -> NewEncoderFn {
        match self {
            EncoderType::Console => new_console,
            EncoderType::Json => new_json,
            EncoderType::LogFmt => new_logfmt,
        }
    }
}

fn new_console(config: EncoderConfig) -> Box<dyn Encoder> {
    Box::new(ConsoleEncoder::new(config))
}

fn new_json(config: EncoderConfig) -> Box<dyn Encoder> {
    Box::new(JsonEncoder::new(config))
}

fn new_logfmt(config: EncoderConfig) -> Box<dyn Encoder> {
    Box::new(LogFmtEncoder::new(config))
}

impl std::str::FromStr for EncoderType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "console" => Ok(EncoderType::Console),
            "json" => Ok(EncoderType::Json),
            "logfmt" => Ok(EncoderType::LogFmt),
            other => Err(crate::Error::Config {
                message: format!("unknown encoder type '{}'", other),
            }),
        }
    }
}

/// Build an encoder of the given type
pub fn new_encoder(encoder: EncoderType, config: EncoderConfig) -> Box<dyn Encoder> {
    (encoder.factory())(config)
}

/// How the level is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelEncoding {
    /// `INFO`
    Capital,
    /// `INFO` wrapped in an ANSI color
    CapitalColor,
}

impl LevelEncoding {
    pub fn encode(self, level: &Level) -> String {
        match self {
            LevelEncoding::Capital => level.as_str().to_string(),
            LevelEncoding::CapitalColor => {
                let color = match *level {
                    Level::TRACE => 36,
                    Level::DEBUG => 35,
                    Level::INFO => 34,
                    Level::WARN => 33,
                    Level::ERROR => 31,
                };
                format!("\x1b[{}m{}\x1b[0m", color, level.as_str())
            }
        }
    }
}

/// Keys and formatting shared by all encoders. A key set to `None` omits
/// that element from the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub message_key: String,
    pub level_key: String,
    pub time_key: Option<String>,
    pub name_key: Option<String>,
    pub caller_key: Option<String>,
    pub stacktrace_key: Option<String>,
    pub level_encoding: LevelEncoding,
    pub line_ending: String,
    /// Element separator of the console encoder
    pub console_separator: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            message_key: "msg".to_string(),
            level_key: "level".to_string(),
            time_key: Some("ts".to_string()),
            name_key: None,
            caller_key: Some("caller".to_string()),
            stacktrace_key: Some("stacktrace".to_string()),
            level_encoding: LevelEncoding::Capital,
            line_ending: "\n".to_string(),
            console_separator: "\t".to_string(),
        }
    }
}

impl EncoderConfig {
    pub fn without_time(mut self) -> Self {
        self.time_key = None;
        self
    }

    pub fn without_caller(mut self) -> Self {
        self.caller_key = None;
        self
    }

    pub fn with_level_encoding(mut self, encoding: LevelEncoding) -> Self {
        self.level_encoding = encoding;
        self
    }

    pub fn with_name_key(mut self, key: impl Into<String>) -> Self {
        self.name_key = Some(key.into());
        self
    }
}

/// Write `value` as a JSON string into `buf`
pub(crate) fn push_json_str(buf: &mut Vec<u8>, value: &str) -> Result<()> {
    serde_json::to_writer(&mut *buf, value)?;
    Ok(())
}
