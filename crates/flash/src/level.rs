//! Lock-free level threshold shared between a logger and its layer

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing::Level;

/// A `LevelFilter` that can be changed at runtime. Clones share the same cell.
#[derive(Debug, Clone)]
pub struct AtomicLevel(Arc<AtomicU8>);

fn to_u8(filter: LevelFilter) -> u8 {
    match filter.into_level() {
        None => 0,
        Some(Level::ERROR) => 1,
        Some(Level::WARN) => 2,
        Some(Level::INFO) => 3,
        Some(Level::DEBUG) => 4,
        Some(_) => 5,
    }
}

fn from_u8(value: u8) -> LevelFilter {
    match value {
        0 => LevelFilter::OFF,
        1 => LevelFilter::ERROR,
        2 => LevelFilter::WARN,
        3 => LevelFilter::INFO,
        4 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

impl AtomicLevel {
    pub fn new(filter: impl Into<LevelFilter>) -> Self {
        Self(Arc::new(AtomicU8::new(to_u8(filter.into()))))
    }

    pub fn get(&self) -> LevelFilter {
        from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, filter: impl Into<LevelFilter>) {
        self.0.store(to_u8(filter.into()), Ordering::Release);
    }

    /// Whether an event at `level` passes the current threshold
    pub fn enabled(&self, level: &Level) -> bool {
        *level <= self.get()
    }
}

impl Default for AtomicLevel {
    fn default() -> Self {
        Self::new(LevelFilter::INFO)
    }
}
