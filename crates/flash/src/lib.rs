//! # Flash
//!
//! An opinionated structured logger assembled from a handful of builder options.
//!
//! ## Features
//!
//! - **Encoders**: console, JSON and logfmt output on top of `tracing`
//! - **Field filtering**: drop selected field keys before they are serialized
//! - **Runtime levels**: toggle debug mode or disable output without rebuilding
//! - **Stacktraces**: captured on errors while in debug mode
//! - **Sinks**: stdout, stderr, plain files and rolling files
//! - **Metrics**: per-level log message counters through the `metrics` facade
//!
//! ## Quick Start
//!
//! ```rust
//! use flash::{EncoderType, Logger};
//!
//! fn main() -> flash::Result<()> {
//!     let logger = Logger::builder()
//!         .encoder(EncoderType::Json)
//!         .skip_keys(["password"])
//!         .build()?;
//!
//!     logger.in_scope(|| {
//!         tracing::info!(user = "alice", password = "hunter2", "user logged in");
//!     });
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod encoder;
pub mod field;
pub mod layer;
pub mod level;
pub mod logger;
pub mod metrics;
pub mod sink;

pub use config::{FlashConfig, LogLevel};
pub use encoder::{
    new_encoder, new_skip_encoder, ConsoleEncoder, Encoder, EncoderConfig, EncoderType,
    JsonEncoder, LevelEncoding, LogFmtEncoder, SkipEncoder,
};
pub use field::{Caller, Entry, Field, FieldValue};
pub use level::AtomicLevel;
pub use logger::{Logger, LoggerBuilder};
pub use metrics::{message_counter, Hook, MetricsRegistry};
pub use sink::{FileConfig, FileRotation, MemorySink, Sink};

// Re-export the level types used throughout the public API
pub use tracing::level_filters::LevelFilter;
pub use tracing::Level;

/// Result type for flash operations
pub type Result<T> = std::result::Result<T, Error>;

/// Flash-specific errors
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Sink error: {message}")]
    Sink { message: String },

    #[error("Encoding error: {message}")]
    Encode { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Logger system error: {message}")]
    System { message: String },
}
