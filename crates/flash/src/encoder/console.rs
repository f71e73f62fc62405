//! Console encoder for human-readable output

use super::json::ObjectWriter;
use super::{Encoder, EncoderConfig};
use crate::field::{Entry, Field};
use crate::Result;

/// Writes time, level, name, caller and message separated by the configured
/// separator, then context and entry fields as a spaced JSON object. A
/// stacktrace goes on the following lines.
#[derive(Debug, Clone)]
pub struct ConsoleEncoder {
    config: EncoderConfig,
    context: Vec<Field>,
}

impl ConsoleEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            context: Vec::new(),
        }
    }
}

impl Encoder for ConsoleEncoder {
    fn encode_entry(&self, entry: &Entry, fields: &[Field]) -> Result<Vec<u8>> {
        let cfg = &self.config;
        let mut elements: Vec<String> = Vec::with_capacity(6);

        if cfg.time_key.is_some() {
            elements.push(entry.formatted_time());
        }
        elements.push(cfg.level_encoding.encode(&entry.level));
        if cfg.name_key.is_some() && !entry.target.is_empty() {
            elements.push(entry.target.clone());
        }
        if let (Some(_), Some(caller)) = (&cfg.caller_key, &entry.caller) {
            elements.push(caller.trimmed());
        }
        elements.push(entry.message.clone());

        let mut out = elements.join(&cfg.console_separator).into_bytes();

        if !self.context.is_empty() || !fields.is_empty() {
            let mut obj = ObjectWriter::new(true);
            for field in self.context.iter().chain(fields) {
                obj.field(field)?;
            }
            out.extend_from_slice(cfg.console_separator.as_bytes());
            out.extend_from_slice(&obj.finish());
        }

        if let (Some(_), Some(stack)) = (&cfg.stacktrace_key, &entry.stacktrace) {
            out.push(b'\n');
            out.extend_from_slice(stack.as_bytes());
        }

        out.extend_from_slice(cfg.line_ending.as_bytes());
        Ok(out)
    }

    fn clone_encoder(&self) -> Box<dyn Encoder> {
        Box::new(self.clone())
    }

    fn add_fields(&mut self, fields: &[Field]) {
        self.context.extend_from_slice(fields);
    }
}
