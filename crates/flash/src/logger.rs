//! Logger assembly and runtime level control

use crate::config::FlashConfig;
use crate::encoder::{
    new_encoder, Encoder, EncoderConfig, EncoderType, LevelEncoding, SkipEncoder,
};
use crate::layer::EncoderLayer;
use crate::level::AtomicLevel;
use crate::metrics::{message_counter, Hook};
use crate::sink::{FileConfig, Sink};
use crate::{Error, Result};
use metrics::Recorder;
use std::io::IsTerminal;
use std::sync::{Arc, Mutex};
use tracing::level_filters::LevelFilter;
use tracing::Dispatch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Builder collecting the options of a [`Logger`].
///
/// Without options the logger writes to stderr at `INFO`, without
/// stacktraces or color. The encoder is `Console` when stdout is a terminal
/// and `Json` otherwise.
pub struct LoggerBuilder {
    encoder: Option<EncoderType>,
    color: bool,
    caller: bool,
    timestamps: bool,
    stacktrace: bool,
    debug: bool,
    level: LevelFilter,
    sink_uris: Vec<String>,
    sinks: Vec<Sink>,
    file: Option<FileConfig>,
    skip_keys: Vec<String>,
    hooks: Vec<Hook>,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            encoder: None,
            color: false,
            caller: true,
            timestamps: true,
            stacktrace: false,
            debug: false,
            level: LevelFilter::INFO,
            sink_uris: Vec::new(),
            sinks: Vec::new(),
            file: None,
            skip_keys: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Builder preloaded from a configuration file
    pub fn from_config(config: &FlashConfig) -> Self {
        let mut builder = Self::new()
            .encoder(config.encoder)
            .debug(config.debug)
            .level(config.level)
            .sinks(config.sinks.iter().cloned())
            .skip_keys(config.skip_keys.iter().cloned());

        builder.color = config.color;
        builder.caller = config.caller;
        builder.timestamps = config.timestamps;
        builder.stacktrace = config.stacktrace;
        builder.file = config.file.clone();
        builder
    }

    pub fn encoder(mut self, encoder: EncoderType) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Colored levels; only honored by the console encoder without a file sink
    pub fn color(mut self) -> Self {
        self.color = true;
        self
    }

    /// Stop annotating entries with the calling file and line
    pub fn without_caller(mut self) -> Self {
        self.caller = false;
        self
    }

    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    /// Replace the default stderr sink with the given sink URIs
    pub fn sinks<I, S>(mut self, uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sink_uris = uris.into_iter().map(Into::into).collect();
        self
    }

    /// Add an already constructed sink
    pub fn sink(mut self, sink: impl Into<Sink>) -> Self {
        self.sinks.push(sink.into());
        self
    }

    /// Enable or disable `DEBUG` output
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Level used while not in debug mode
    pub fn level(mut self, level: impl Into<LevelFilter>) -> Self {
        self.level = level.into();
        self
    }

    /// Capture stacktraces. They are attached to `ERROR` entries while in debug
    /// mode; outside debug mode no entry carries one.
    pub fn stacktrace(mut self) -> Self {
        self.stacktrace = true;
        self
    }

    /// Count log messages per level as `<app_name>_log_messages_total`
    pub fn metrics(mut self, app_name: &str, recorder: Arc<dyn Recorder + Send + Sync>) -> Self {
        self.hooks.push(message_counter(app_name, recorder));
        self
    }

    pub fn hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Log into a file; replaces every other sink and disables color
    pub fn file(mut self, config: FileConfig) -> Self {
        self.file = Some(config);
        self
    }

    /// Drop fields with these keys from every entry
    pub fn skip_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    fn build_encoder(&self, encoder: EncoderType, color: bool) -> Box<dyn Encoder> {
        let mut config = EncoderConfig::default();
        if !self.timestamps {
            config = config.without_time();
        }
        if !self.caller {
            config = config.without_caller();
        }
        if color {
            config = config.with_level_encoding(LevelEncoding::CapitalColor);
        }

        let base = new_encoder(encoder, config);
        if self.skip_keys.is_empty() {
            base
        } else {
            Box::new(SkipEncoder::new(base, self.skip_keys.iter().cloned()))
        }
    }

    fn build_sinks(&self) -> Result<Vec<Sink>> {
        if let Some(file) = &self.file {
            return Ok(vec![Sink::rolling_file(file)?]);
        }

        let mut sinks = self
            .sink_uris
            .iter()
            .map(|uri| Sink::parse(uri))
            .collect::<Result<Vec<_>>>()?;
        sinks.extend(self.sinks.iter().cloned());

        if sinks.is_empty() {
            sinks.push(Sink::stderr());
        }
        Ok(sinks)
    }

    pub fn build(self) -> Result<Logger> {
        let terminal = std::io::stdout().is_terminal();
        let encoder = self.encoder.unwrap_or(if terminal {
            EncoderType::Console
        } else {
            EncoderType::Json
        });
        let color = self.color && encoder == EncoderType::Console && self.file.is_none();

        let sinks = self.build_sinks()?;
        let encoder = self.build_encoder(encoder, color);

        let base_level = self.level;
        let level = AtomicLevel::new(if self.debug {
            LevelFilter::DEBUG
        } else {
            base_level
        });
        let stacktrace_level = AtomicLevel::new(if self.stacktrace && self.debug {
            LevelFilter::ERROR
        } else {
            LevelFilter::OFF
        });

        let mut layer = EncoderLayer::new(encoder, sinks.clone())
            .with_level(level.clone())
            .with_stacktrace_level(stacktrace_level.clone())
            .with_caller(self.caller);
        for hook in self.hooks {
            layer = layer.with_hook(hook);
        }

        let dispatch = Dispatch::new(Registry::default().with(layer));

        Ok(Logger {
            dispatch,
            level,
            stacktrace_level,
            current_level: Mutex::new(base_level),
            stacktrace_disabled: !self.stacktrace,
            sinks,
        })
    }
}

/// A configured logger. Entries are produced through the `tracing` macros
/// while the logger is the active dispatcher, see [`Logger::in_scope`] and
/// [`Logger::install`].
pub struct Logger {
    dispatch: Dispatch,
    level: AtomicLevel,
    stacktrace_level: AtomicLevel,
    /// Level restored when leaving debug mode
    current_level: Mutex<LevelFilter>,
    stacktrace_disabled: bool,
    sinks: Vec<Sink>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level.get())
            .field("stacktrace_level", &self.stacktrace_level.get())
            .field("sinks", &self.sinks)
            .finish()
    }
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Logger with default options
    pub fn new() -> Result<Self> {
        LoggerBuilder::new().build()
    }

    pub fn from_config(config: &FlashConfig) -> Result<Self> {
        config.validate()?;
        LoggerBuilder::from_config(config).build()
    }

    /// Enable or disable `DEBUG` output. Leaving debug mode restores the last
    /// level set through [`Logger::set_level`].
    pub fn set_debug(&self, debug: bool) {
        let (level, stacktrace_level) = if debug {
            (LevelFilter::DEBUG, LevelFilter::ERROR)
        } else {
            (*self.lock_current_level(), LevelFilter::OFF)
        };

        self.level.set(level);
        self.set_stacktrace_level(stacktrace_level);
    }

    /// Suppress all output
    pub fn disable(&self) {
        *self.lock_current_level() = LevelFilter::OFF;
        self.level.set(LevelFilter::OFF);
    }

    /// Set the level. Stacktraces follow debug mode: `DEBUG` or more verbose
    /// turns them on for errors, leaving it turns them off.
    pub fn set_level(&self, level: impl Into<LevelFilter>) {
        let level = level.into();
        let old_level = {
            let mut current = self.lock_current_level();
            std::mem::replace(&mut *current, level)
        };
        self.level.set(level);

        if level >= LevelFilter::DEBUG {
            self.set_stacktrace_level(LevelFilter::ERROR);
        } else if old_level >= LevelFilter::DEBUG {
            self.set_stacktrace_level(LevelFilter::OFF);
        }
    }

    pub fn level(&self) -> LevelFilter {
        self.level.get()
    }

    pub fn stacktrace_level(&self) -> LevelFilter {
        self.stacktrace_level.get()
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Run `f` with this logger as the thread's default dispatcher
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Install this logger as the global default dispatcher
    pub fn install(&self) -> Result<()> {
        tracing::dispatcher::set_global_default(self.dispatch.clone()).map_err(|e| {
            Error::System {
                message: format!("Failed to install global logger: {}", e),
            }
        })
    }

    /// Flush every sink
    pub fn flush(&self) -> Result<()> {
        for sink in &self.sinks {
            sink.flush()?;
        }
        Ok(())
    }

    fn set_stacktrace_level(&self, level: LevelFilter) {
        if self.stacktrace_disabled {
            return;
        }
        self.stacktrace_level.set(level);
    }

    fn lock_current_level(&self) -> std::sync::MutexGuard<'_, LevelFilter> {
        self.current_level
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            eprintln!("flash: failed to flush sinks: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[test]
    fn test_defaults() {
        let memory = MemorySink::new();
        let logger = Logger::builder().sink(memory.clone()).build().unwrap();

        assert_eq!(logger.level(), LevelFilter::INFO);
        assert_eq!(logger.stacktrace_level(), LevelFilter::OFF);
        assert_eq!(logger.sinks.len(), 1);
    }

    #[test]
    fn test_stderr_is_the_fallback_sink() {
        let logger = Logger::builder().build().unwrap();
        assert_eq!(logger.sinks.len(), 1);
        assert_eq!(logger.sinks[0].name(), "stderr");
    }

    #[test]
    fn test_debug_option() {
        let logger = Logger::builder()
            .sink(MemorySink::new())
            .debug(true)
            .stacktrace()
            .build()
            .unwrap();

        assert_eq!(logger.level(), LevelFilter::DEBUG);
        assert_eq!(logger.stacktrace_level(), LevelFilter::ERROR);

        logger.set_debug(false);
        assert_eq!(logger.level(), LevelFilter::INFO);
        assert_eq!(logger.stacktrace_level(), LevelFilter::OFF);
    }

    #[test]
    fn test_stacktrace_level_untouched_when_disabled() {
        let logger = Logger::builder().sink(MemorySink::new()).build().unwrap();

        logger.set_debug(true);
        assert_eq!(logger.level(), LevelFilter::DEBUG);
        assert_eq!(logger.stacktrace_level(), LevelFilter::OFF);

        logger.set_level(LevelFilter::TRACE);
        assert_eq!(logger.stacktrace_level(), LevelFilter::OFF);
    }

    #[test]
    fn test_set_level_moves_stacktrace_threshold() {
        let logger = Logger::builder()
            .sink(MemorySink::new())
            .stacktrace()
            .build()
            .unwrap();

        logger.set_level(LevelFilter::WARN);
        assert_eq!(logger.stacktrace_level(), LevelFilter::OFF);

        logger.set_level(LevelFilter::DEBUG);
        assert_eq!(logger.stacktrace_level(), LevelFilter::ERROR);

        logger.set_level(LevelFilter::INFO);
        assert_eq!(logger.level(), LevelFilter::INFO);
        assert_eq!(logger.stacktrace_level(), LevelFilter::OFF);
    }

    #[test]
    fn test_disable_then_set_debug_false_stays_silent() {
        let logger = Logger::builder().sink(MemorySink::new()).build().unwrap();

        logger.disable();
        assert_eq!(logger.level(), LevelFilter::OFF);

        logger.set_debug(true);
        logger.set_debug(false);
        assert_eq!(logger.level(), LevelFilter::OFF);
    }

    #[test]
    fn test_invalid_sink_uri_fails_build() {
        let err = Logger::builder().sinks(["memory://"]).build().unwrap_err();
        assert!(matches!(err, Error::Sink { .. }));
    }
}
