//! Encoder decorator that drops fields by key

use super::{Encoder, EncoderConfig};
use crate::field::{Entry, Field};
use crate::Result;
use std::collections::HashSet;
use std::sync::Arc;

/// Wraps another encoder and removes every entry field whose key is in the
/// skip set before delegating. Matching is exact and case-sensitive.
///
/// Context fields added through [`Encoder::add_fields`] are handed to the
/// wrapped encoder untouched; only the fields of each entry are filtered.
pub struct SkipEncoder<E = Box<dyn Encoder>> {
    inner: E,
    skip: Arc<HashSet<String>>,
}

/// Build the wrapped encoder from `config` and decorate it with `skip`
pub fn new_skip_encoder<F, E, I, S>(
    new_encoder: F,
    config: EncoderConfig,
    skip: I,
) -> SkipEncoder<E>
where
    F: FnOnce(EncoderConfig) -> E,
    E: Encoder,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    SkipEncoder::new(new_encoder(config), skip)
}

impl<E: Encoder> SkipEncoder<E> {
    /// Wrap `inner`, dropping entry fields keyed by any of `skip`. Repeated
    /// keys collapse into one.
    pub fn new<I, S>(inner: E, skip: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner,
            skip: Arc::new(skip.into_iter().map(Into::into).collect()),
        }
    }

    /// Keys dropped from every entry
    pub fn skip_keys(&self) -> &HashSet<String> {
        &self.skip
    }

    /// Fields that survive filtering, in their original order
    pub fn filter(&self, fields: &[Field]) -> Vec<Field> {
        fields
            .iter()
            .filter(|field| !self.skip.contains(&field.key))
            .cloned()
            .collect()
    }
}

impl<E: Encoder> Encoder for SkipEncoder<E> {
    fn encode_entry(&self, entry: &Entry, fields: &[Field]) -> Result<Vec<u8>> {
        if self.skip.is_empty() {
            return self.inner.encode_entry(entry, fields);
        }

        let filtered = self.filter(fields);
        self.inner.encode_entry(entry, &filtered)
    }

    fn clone_encoder(&self) -> Box<dyn Encoder> {
        Box::new(SkipEncoder {
            inner: self.inner.clone_encoder(),
            skip: Arc::clone(&self.skip),
        })
    }

    fn add_fields(&mut self, fields: &[Field]) {
        self.inner.add_fields(fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::test_support::RecordingEncoder;
    use crate::encoder::{EncoderType, JsonEncoder};
    use crate::field::Caller;
    use proptest::prelude::*;
    use tracing::Level;

    fn kv(pairs: &[(&str, &str)]) -> Vec<Field> {
        pairs.iter().map(|(k, v)| Field::new(*k, *v)).collect()
    }

    fn entry() -> Entry {
        Entry::new(Level::INFO, "hello world")
            .with_target("flash::tests")
            .with_caller(Caller::new("src/encoder/skip.rs", 10))
    }

    #[test]
    fn test_skips_single_key() {
        let recorder = RecordingEncoder::default();
        let enc = SkipEncoder::new(recorder.clone(), ["key1"]);

        enc.encode_entry(&entry(), &kv(&[("key1", "val1"), ("key2", "val2")]))
            .unwrap();

        assert_eq!(recorder.last_fields(), kv(&[("key2", "val2")]));
    }

    #[test]
    fn test_empty_skip_set_passes_everything() {
        let recorder = RecordingEncoder::default();
        let enc = SkipEncoder::new(recorder.clone(), Vec::<String>::new());
        let fields = kv(&[("key1", "val1"), ("key2", "val2")]);

        enc.encode_entry(&entry(), &fields).unwrap();

        assert_eq!(recorder.last_fields(), fields);
    }

    #[test]
    fn test_skips_multiple_keys() {
        let recorder = RecordingEncoder::default();
        let enc = SkipEncoder::new(recorder.clone(), ["key1", "key3"]);

        enc.encode_entry(
            &entry(),
            &kv(&[("key1", "a"), ("key2", "b"), ("key3", "c")]),
        )
        .unwrap();

        assert_eq!(recorder.last_fields(), kv(&[("key2", "b")]));
    }

    #[test]
    fn test_duplicate_keys_are_filtered_consistently() {
        let recorder = RecordingEncoder::default();
        let enc = SkipEncoder::new(recorder.clone(), ["dup", "dup"]);
        assert_eq!(enc.skip_keys().len(), 1);

        enc.encode_entry(
            &entry(),
            &kv(&[("dup", "1"), ("keep", "x"), ("dup", "2"), ("keep", "y")]),
        )
        .unwrap();

        assert_eq!(recorder.last_fields(), kv(&[("keep", "x"), ("keep", "y")]));
    }

    #[test]
    fn test_match_is_exact_and_case_sensitive() {
        let recorder = RecordingEncoder::default();
        let enc = SkipEncoder::new(recorder.clone(), ["user"]);
        let fields = kv(&[("User", "a"), ("user_id", "b"), ("user", "c"), ("users", "d")]);

        enc.encode_entry(&entry(), &fields).unwrap();

        assert_eq!(
            recorder.last_fields(),
            kv(&[("User", "a"), ("user_id", "b"), ("users", "d")])
        );
    }

    #[test]
    fn test_entry_metadata_is_untouched() {
        let recorder = RecordingEncoder::default();
        let enc = SkipEncoder::new(recorder.clone(), ["msg", "level", "caller", "ts"]);
        let original = entry().with_stacktrace("frame 0");

        enc.encode_entry(&original, &kv(&[("msg", "field")])).unwrap();

        assert_eq!(recorder.last_entry(), Some(original));
        assert!(recorder.last_fields().is_empty());
    }

    #[test]
    fn test_inner_error_is_returned_verbatim() {
        let enc = SkipEncoder::new(RecordingEncoder::failing(), ["key1"]);

        let err = enc
            .encode_entry(&entry(), &kv(&[("key1", "val1")]))
            .unwrap_err();

        assert!(matches!(
            err,
            crate::Error::Encode { ref message } if message == "recording encoder failure"
        ));
    }

    #[test]
    fn test_clone_keeps_filtering_and_delegates_context() {
        let recorder = RecordingEncoder::default();
        let enc = SkipEncoder::new(recorder.clone(), ["secret"]);

        let mut child = enc.clone_encoder();
        child.add_fields(&kv(&[("secret", "ctx")]));
        child
            .encode_entry(&entry(), &kv(&[("secret", "s"), ("public", "p")]))
            .unwrap();

        assert_eq!(recorder.last_fields(), kv(&[("public", "p")]));
    }

    #[test]
    fn test_output_matches_wrapped_encoder_without_skipped_fields() {
        let config = EncoderConfig::default().without_time().without_caller();
        let plain = JsonEncoder::new(config.clone());
        let skipping = new_skip_encoder(EncoderType::Json.factory(), config, ["key1"]);

        let expected = plain
            .encode_entry(&entry(), &kv(&[("key2", "val2")]))
            .unwrap();
        let actual = skipping
            .encode_entry(&entry(), &kv(&[("key1", "val1"), ("key2", "val2")]))
            .unwrap();

        assert_eq!(actual, expected);
        assert_eq!(
            String::from_utf8(actual).unwrap(),
            "{\"level\":\"INFO\",\"msg\":\"hello world\",\"key2\":\"val2\"}\n"
        );
    }

    fn fields_strategy() -> impl Strategy<Value = Vec<Field>> {
        prop::collection::vec(("[a-e]", "[a-z0-9]{0,4}"), 0..16)
            .prop_map(|pairs| pairs.into_iter().map(|(k, v)| Field::new(k, v)).collect())
    }

    proptest! {
        #[test]
        fn prop_filter_removes_skipped_keys_in_order(
            fields in fields_strategy(),
            skip in prop::collection::hash_set("[a-e]", 0..5),
        ) {
            let enc = SkipEncoder::new(RecordingEncoder::default(), skip.clone());
            let expected: Vec<Field> = fields
                .iter()
                .filter(|f| !skip.contains(&f.key))
                .cloned()
                .collect();

            prop_assert_eq!(enc.filter(&fields), expected);
        }

        #[test]
        fn prop_filter_is_idempotent(
            fields in fields_strategy(),
            skip in prop::collection::hash_set("[a-e]", 0..5),
        ) {
            let enc = SkipEncoder::new(RecordingEncoder::default(), skip);
            let once = enc.filter(&fields);
            let twice = enc.filter(&once);

            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_empty_set_is_pass_through(fields in fields_strategy()) {
            let recorder = RecordingEncoder::default();
            let enc = SkipEncoder::new(recorder.clone(), Vec::<String>::new());
            let direct = recorder.encode_entry(&entry(), &fields).unwrap();
            let wrapped = enc.encode_entry(&entry(), &fields).unwrap();

            prop_assert_eq!(wrapped, direct);
            prop_assert_eq!(recorder.last_fields(), fields);
        }
    }
}
