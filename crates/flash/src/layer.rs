//! Layer bridging `tracing` events to flash encoders and sinks

use crate::encoder::Encoder;
use crate::field::{Caller, Entry, FieldVisitor};
use crate::level::AtomicLevel;
use crate::metrics::Hook;
use crate::sink::Sink;
use std::backtrace::Backtrace;
use tracing::span::{Attributes, Id, Record};
use tracing::subscriber::Interest;
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Encoder of a span: its parent's encoder plus the span's own fields
struct SpanEncoder(Box<dyn Encoder>);

/// Layer encoding every enabled event and writing it to all sinks.
///
/// The level and stacktrace thresholds are shared [`AtomicLevel`]s, so they
/// can change while the layer is installed.
pub struct EncoderLayer {
    encoder: Box<dyn Encoder>,
    sinks: Vec<Sink>,
    level: AtomicLevel,
    stacktrace_level: AtomicLevel,
    add_caller: bool,
    hooks: Vec<Hook>,
}

impl EncoderLayer {
    pub fn new(encoder: Box<dyn Encoder>, sinks: Vec<Sink>) -> Self {
        Self {
            encoder,
            sinks,
            level: AtomicLevel::default(),
            stacktrace_level: AtomicLevel::new(tracing::level_filters::LevelFilter::OFF),
            add_caller: true,
            hooks: Vec::new(),
        }
    }

    pub fn with_level(mut self, level: AtomicLevel) -> Self {
        self.level = level;
        self
    }

    /// Events at or above this threshold carry a captured stacktrace
    pub fn with_stacktrace_level(mut self, level: AtomicLevel) -> Self {
        self.stacktrace_level = level;
        self
    }

    pub fn with_caller(mut self, add_caller: bool) -> Self {
        self.add_caller = add_caller;
        self
    }

    pub fn with_hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }

    fn build_entry(&self, event: &Event<'_>, message: Option<String>) -> Entry {
        let metadata = event.metadata();
        let level = *metadata.level();

        let mut entry =
            Entry::new(level, message.unwrap_or_default()).with_target(metadata.target());

        if self.add_caller {
            if let (Some(file), Some(line)) = (metadata.file(), metadata.line()) {
                entry = entry.with_caller(Caller::new(file, line));
            }
        }

        if self.stacktrace_level.enabled(&level) {
            entry = entry.with_stacktrace(Backtrace::force_capture().to_string());
        }

        entry
    }

    fn write(&self, buf: &[u8]) {
        for sink in &self.sinks {
            if let Err(e) = sink.write_all(buf) {
                eprintln!("flash: write to sink '{}' failed: {}", sink.name(), e);
            }
        }
    }
}

impl<S> Layer<S> for EncoderLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        // thresholds change at runtime, so callsites must be re-checked
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        // spans stay enabled so their context is there once events pass again
        metadata.is_span() || self.level.enabled(metadata.level())
    }

    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut visitor = FieldVisitor::new();
        attrs.record(&mut visitor);

        let mut encoder = match span.parent() {
            Some(parent) => match parent.extensions().get::<SpanEncoder>() {
                Some(parent_encoder) => parent_encoder.0.clone_encoder(),
                None => self.encoder.clone_encoder(),
            },
            None => self.encoder.clone_encoder(),
        };
        encoder.add_fields(&visitor.fields);

        span.extensions_mut().insert(SpanEncoder(encoder));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut visitor = FieldVisitor::new();
        values.record(&mut visitor);

        let mut extensions = span.extensions_mut();
        if let Some(encoder) = extensions.get_mut::<SpanEncoder>() {
            encoder.0.add_fields(&visitor.fields);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);
        let entry = self.build_entry(event, visitor.message.take());

        for hook in &self.hooks {
            if let Err(e) = hook(&entry) {
                eprintln!("flash: entry hook failed: {}", e);
            }
        }

        let encoded = match ctx.event_span(event) {
            Some(span) => match span.extensions().get::<SpanEncoder>() {
                Some(span_encoder) => span_encoder.0.encode_entry(&entry, &visitor.fields),
                None => self.encoder.encode_entry(&entry, &visitor.fields),
            },
            None => self.encoder.encode_entry(&entry, &visitor.fields),
        };

        match encoded {
            Ok(buf) => self.write(&buf),
            Err(e) => eprintln!("flash: failed to encode entry: {}", e),
        }
    }
}
