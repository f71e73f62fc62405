//! logfmt encoder

use super::{Encoder, EncoderConfig};
use crate::field::{Entry, Field, FieldValue};
use crate::Result;

/// Encodes entries as space-separated `key=value` pairs
#[derive(Debug, Clone)]
pub struct LogFmtEncoder {
    config: EncoderConfig,
    context: Vec<Field>,
}

impl LogFmtEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            context: Vec::new(),
        }
    }
}

fn is_reserved(c: char) -> bool {
    c.is_whitespace() || c == '=' || c == '"' || c.is_control()
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty() || value.chars().any(is_reserved)
}

/// Keys cannot be quoted in logfmt, so reserved characters become `_`
fn push_key(out: &mut String, key: &str) {
    if key.is_empty() {
        out.push('_');
        return;
    }
    out.extend(key.chars().map(|c| if is_reserved(c) { '_' } else { c }));
}

fn push_pair(out: &mut String, key: &str, value: &str) -> Result<()> {
    if !out.is_empty() {
        out.push(' ');
    }
    push_key(out, key);
    out.push('=');
    if needs_quoting(value) {
        out.push_str(&serde_json::to_string(value)?);
    } else {
        out.push_str(value);
    }
    Ok(())
}

impl Encoder for LogFmtEncoder {
    fn encode_entry(&self, entry: &Entry, fields: &[Field]) -> Result<Vec<u8>> {
        let cfg = &self.config;
        let mut out = String::new();

        if let Some(key) = &cfg.time_key {
            push_pair(&mut out, key, &entry.formatted_time())?;
        }
        push_pair(&mut out, &cfg.level_key, &cfg.level_encoding.encode(&entry.level))?;
        if let Some(key) = &cfg.name_key {
            if !entry.target.is_empty() {
                push_pair(&mut out, key, &entry.target)?;
            }
        }
        if let (Some(key), Some(caller)) = (&cfg.caller_key, &entry.caller) {
            push_pair(&mut out, key, &caller.trimmed())?;
        }
        push_pair(&mut out, &cfg.message_key, &entry.message)?;

        for field in self.context.iter().chain(fields) {
            let value = match &field.value {
                FieldValue::Str(s) | FieldValue::Debug(s) => s.clone(),
                other => other.to_string(),
            };
            push_pair(&mut out, &field.key, &value)?;
        }

        if let (Some(key), Some(stack)) = (&cfg.stacktrace_key, &entry.stacktrace) {
            push_pair(&mut out, key, stack)?;
        }

        out.push_str(&cfg.line_ending);
        Ok(out.into_bytes())
    }

    fn clone_encoder(&self) -> Box<dyn Encoder> {
        Box::new(self.clone())
    }

    fn add_fields(&mut self, fields: &[Field]) {
        self.context.extend_from_slice(fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Caller;
    use tracing::Level;

    #[test]
    fn test_quotes_values_with_spaces() {
        let enc = LogFmtEncoder::new(EncoderConfig::default().without_time().without_caller());
        let out = enc
            .encode_entry(
                &Entry::new(Level::INFO, "hello world"),
                &[Field::new("key1", "val1"), Field::new("key2", "val2")],
            )
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "level=INFO msg=\"hello world\" key1=val1 key2=val2\n"
        );
    }

    #[test]
    fn test_caller_and_plain_message() {
        let enc = LogFmtEncoder::new(EncoderConfig::default().without_time());
        let entry = Entry::new(Level::INFO, "info").with_caller(Caller::new("tests/logger.rs", 98));

        let out = enc.encode_entry(&entry, &[]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "level=INFO caller=tests/logger.rs:98 msg=info\n"
        );
    }

    #[test]
    fn test_reserved_key_characters_are_replaced() {
        let enc = LogFmtEncoder::new(EncoderConfig::default().without_time().without_caller());
        let out = enc
            .encode_entry(
                &Entry::new(Level::INFO, "m"),
                &[Field::new("a b=c", "v"), Field::new("\"q\"", "x"), Field::new("", "e")],
            )
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "level=INFO msg=m a_b_c=v _q_=x _=e\n"
        );
    }

    #[test]
    fn test_escaping() {
        assert!(needs_quoting(""));
        assert!(needs_quoting("a=b"));
        assert!(needs_quoting("say \"hi\""));
        assert!(needs_quoting("line\nbreak"));
        assert!(!needs_quoting("plain-value_1.2"));

        let enc = LogFmtEncoder::new(EncoderConfig::default().without_time().without_caller());
        let out = enc
            .encode_entry(
                &Entry::new(Level::WARN, "w"),
                &[Field::new("empty", ""), Field::new("n", 4u64), Field::new("q", "a\"b")],
            )
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "level=WARN msg=w empty=\"\" n=4 q=\"a\\\"b\"\n"
        );
    }
}
