//! JSON encoder, one object per line

use super::{push_json_str, Encoder, EncoderConfig};
use crate::field::{Entry, Field};
use crate::Result;

/// Encodes entries as single-line JSON objects. Keys are written in a fixed
/// order: level, time, name, caller, message, context fields, entry fields,
/// stacktrace. Duplicate field keys are emitted as given.
#[derive(Debug, Clone)]
pub struct JsonEncoder {
    config: EncoderConfig,
    /// Pre-encoded context fields, `"key":value` pairs joined by `,`
    context: Vec<u8>,
}

impl JsonEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            context: Vec::new(),
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }
}

/// Incremental writer for a flat JSON object
pub(crate) struct ObjectWriter {
    buf: Vec<u8>,
    first: bool,
    key_sep: &'static [u8],
    field_sep: &'static [u8],
}

impl ObjectWriter {
    pub(crate) fn new(spaced: bool) -> Self {
        let (key_sep, field_sep): (&'static [u8], &'static [u8]) = if spaced {
            (b": ", b", ")
        } else {
            (b":", b",")
        };
        Self {
            buf: vec![b'{'],
            first: true,
            key_sep,
            field_sep,
        }
    }

    fn key(&mut self, key: &str) -> Result<()> {
        if !self.first {
            self.buf.extend_from_slice(self.field_sep);
        }
        self.first = false;
        push_json_str(&mut self.buf, key)?;
        self.buf.extend_from_slice(self.key_sep);
        Ok(())
    }

    pub(crate) fn str(&mut self, key: &str, value: &str) -> Result<()> {
        self.key(key)?;
        push_json_str(&mut self.buf, value)
    }

    pub(crate) fn field(&mut self, field: &Field) -> Result<()> {
        self.key(&field.key)?;
        serde_json::to_writer(&mut self.buf, &field.value)?;
        Ok(())
    }

    pub(crate) fn raw(&mut self, encoded: &[u8]) {
        if encoded.is_empty() {
            return;
        }
        if !self.first {
            self.buf.extend_from_slice(self.field_sep);
        }
        self.first = false;
        self.buf.extend_from_slice(encoded);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.first
    }

    pub(crate) fn finish(mut self) -> Vec<u8> {
        self.buf.push(b'}');
        self.buf
    }

    /// The pairs written so far, without the surrounding braces
    pub(crate) fn into_pairs(mut self) -> Vec<u8> {
        self.buf.remove(0);
        self.buf
    }
}

impl Encoder for JsonEncoder {
    fn encode_entry(&self, entry: &Entry, fields: &[Field]) -> Result<Vec<u8>> {
        let cfg = &self.config;
        let mut obj = ObjectWriter::new(false);

        obj.str(&cfg.level_key, &cfg.level_encoding.encode(&entry.level))?;
        if let Some(key) = &cfg.time_key {
            obj.str(key, &entry.formatted_time())?;
        }
        if let Some(key) = &cfg.name_key {
            if !entry.target.is_empty() {
                obj.str(key, &entry.target)?;
            }
        }
        if let (Some(key), Some(caller)) = (&cfg.caller_key, &entry.caller) {
            obj.str(key, &caller.trimmed())?;
        }
        obj.str(&cfg.message_key, &entry.message)?;

        obj.raw(&self.context);
        for field in fields {
            obj.field(field)?;
        }

        if let (Some(key), Some(stack)) = (&cfg.stacktrace_key, &entry.stacktrace) {
            obj.str(key, stack)?;
        }

        let mut out = obj.finish();
        out.extend_from_slice(cfg.line_ending.as_bytes());
        Ok(out)
    }

    fn clone_encoder(&self) -> Box<dyn Encoder> {
        Box::new(self.clone())
    }

    fn add_fields(&mut self, fields: &[Field]) {
        let mut obj = ObjectWriter::new(false);
        for field in fields {
            // serializing a FieldValue into memory cannot fail
            if obj.field(field).is_err() {
                return;
            }
        }
        if obj.is_empty() {
            return;
        }
        let pairs = obj.into_pairs();
        if !self.context.is_empty() {
            self.context.push(b',');
        }
        self.context.extend_from_slice(&pairs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::LevelEncoding;
    use crate::field::Caller;
    use chrono::TimeZone;
    use serde_json::Value;
    use tracing::Level;

    fn bare() -> EncoderConfig {
        EncoderConfig::default().without_time().without_caller()
    }

    #[test]
    fn test_encode_with_fields() {
        let enc = JsonEncoder::new(bare());
        let out = enc
            .encode_entry(
                &Entry::new(Level::INFO, "hello world"),
                &[Field::new("key1", "val1"), Field::new("key2", "val2")],
            )
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"level\":\"INFO\",\"msg\":\"hello world\",\"key1\":\"val1\",\"key2\":\"val2\"}\n"
        );
    }

    #[test]
    fn test_full_entry_is_valid_json() {
        let enc = JsonEncoder::new(EncoderConfig::default().with_name_key("logger"));
        let mut entry = Entry::new(Level::ERROR, "boom \"quoted\"\n")
            .with_target("app::db")
            .with_caller(Caller::new("src/db/pool.rs", 88))
            .with_stacktrace("frame 0\nframe 1");
        entry.timestamp = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let out = enc
            .encode_entry(&entry, &[Field::new("attempt", 3i64), Field::new("ok", false)])
            .unwrap();
        let v: Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(v["level"], "ERROR");
        assert_eq!(v["ts"], "2024-05-01T12:00:00.000Z");
        assert_eq!(v["logger"], "app::db");
        assert_eq!(v["caller"], "db/pool.rs:88");
        assert_eq!(v["msg"], "boom \"quoted\"\n");
        assert_eq!(v["attempt"], 3);
        assert_eq!(v["ok"], false);
        assert_eq!(v["stacktrace"], "frame 0\nframe 1");
    }

    #[test]
    fn test_context_fields_precede_entry_fields() {
        let mut enc = JsonEncoder::new(bare());
        enc.add_fields(&[Field::new("request_id", "abc")]);
        let mut child = enc.clone_encoder();
        child.add_fields(&[Field::new("attempt", 2u64)]);

        let out = child
            .encode_entry(&Entry::new(Level::WARN, "retry"), &[Field::new("k", "v")])
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"level\":\"WARN\",\"msg\":\"retry\",\"request_id\":\"abc\",\"attempt\":2,\"k\":\"v\"}\n"
        );

        // the parent context is unaffected by the child
        let out = enc
            .encode_entry(&Entry::new(Level::WARN, "retry"), &[])
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"level\":\"WARN\",\"msg\":\"retry\",\"request_id\":\"abc\"}\n"
        );
    }

    #[test]
    fn test_level_encoding_applies() {
        let enc = JsonEncoder::new(bare().with_level_encoding(LevelEncoding::Capital));
        let out = enc.encode_entry(&Entry::new(Level::DEBUG, "d"), &[]).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("{\"level\":\"DEBUG\""));
    }
}
