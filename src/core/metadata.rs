//! Purpose: Header-like content descriptors bound to every content stream.
//! Exports: `Metadata`, `MetadataOption`, and the recognized key constants.
//! Role: Carries length/type/location/framing hints through wrap chains and into spans.
//! Invariants: Keys compare case-insensitively (canonical MIME form); values keep insertion order.
//! Invariants: Accessors never fail; absent or malformed values read as `None`.
use std::fmt;
use std::path::Path;

use serde::ser::{Serialize, SerializeMap, Serializer};
use url::Url;

use crate::core::framing::FramingType;

pub const CONTENT_LOCATION_KEY: &str = "Content-Location";
pub const CONTENT_TYPE_KEY: &str = "Content-Type";
pub const CONTENT_LENGTH_KEY: &str = "Content-Length";
pub const FRAMING_TYPE_KEY: &str = "Framing-Type";

/// A single mutation applied by [`Metadata::apply_options`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MetadataOption {
    Set(String, String),
    Add(String, String),
}

impl MetadataOption {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set(key.into(), value.into())
    }

    pub fn add(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Add(key.into(), value.into())
    }

    pub fn content_type(value: impl Into<String>) -> Self {
        Self::set(CONTENT_TYPE_KEY, value)
    }

    pub fn content_length(len: u64) -> Self {
        Self::set(CONTENT_LENGTH_KEY, len.to_string())
    }

    pub fn content_location(value: impl Into<String>) -> Self {
        Self::set(CONTENT_LOCATION_KEY, value)
    }

    pub fn framing_type(framing_type: &FramingType) -> Self {
        Self::set(FRAMING_TYPE_KEY, framing_type.as_str())
    }

    fn apply(self, target: &mut Metadata) {
        match self {
            MetadataOption::Set(key, value) => target.set(&key, value),
            MetadataOption::Add(key, value) => target.add(&key, value),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Metadata {
    entries: Vec<(String, Vec<String>)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(opts: impl IntoIterator<Item = MetadataOption>) -> Self {
        let mut metadata = Self::new();
        metadata.apply_options(opts);
        metadata
    }

    pub fn apply_options(&mut self, opts: impl IntoIterator<Item = MetadataOption>) -> &mut Self {
        for opt in opts {
            opt.apply(self);
        }
        self
    }

    /// Replace all values of `key` with `value`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = canonical_key(key);
        let value = value.into();
        match self.position(&key) {
            Some(idx) => self.entries[idx].1 = vec![value],
            None => self.entries.push((key, vec![value])),
        }
    }

    /// Append `value` to the values of `key`.
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        let key = canonical_key(key);
        let value = value.into();
        match self.position(&key) {
            Some(idx) => self.entries[idx].1.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// First value of `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values(key).first().map(String::as_str)
    }

    pub fn values(&self, key: &str) -> &[String] {
        match self.position(&canonical_key(key)) {
            Some(idx) => &self.entries[idx].1,
            None => &[],
        }
    }

    pub fn del(&mut self, key: &str) {
        let key = canonical_key(key);
        self.entries.retain(|(existing, _)| *existing != key);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.get(CONTENT_LENGTH_KEY)?.trim().parse().ok()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get(CONTENT_TYPE_KEY)
    }

    /// `Content-Location` as a URL. Absolute filesystem paths are accepted and
    /// turned into `file://` URLs.
    pub fn content_location(&self) -> Option<Url> {
        let raw = self.get(CONTENT_LOCATION_KEY)?;
        if let Ok(url) = Url::parse(raw) {
            return Some(url);
        }
        let path = Path::new(raw);
        if path.is_absolute() {
            return Url::from_file_path(path).ok();
        }
        None
    }

    pub fn framing_type(&self) -> Option<FramingType> {
        self.get(FRAMING_TYPE_KEY).map(FramingType::from)
    }

    fn position(&self, canonical: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == canonical)
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, values) in &self.entries {
            map.serialize_entry(key, values)?;
        }
        map.end()
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Canonical MIME header form: `content-length` becomes `Content-Length`.
/// Keys containing spaces or non-token bytes have no header form and are
/// lowercased instead, so lookups stay case-insensitive.
pub fn canonical_key(key: &str) -> String {
    let valid = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-!#$%&'*+.^_`|~".contains(&b));
    if !valid {
        return key.to_lowercase();
    }
    let mut out = String::with_capacity(key.len());
    let mut upper = true;
    for ch in key.chars() {
        if upper {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch.to_ascii_lowercase());
        }
        upper = ch == '-';
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{
        CONTENT_LENGTH_KEY, CONTENT_LOCATION_KEY, Metadata, MetadataOption, canonical_key,
    };
    use crate::core::framing::FramingType;

    #[test]
    fn keys_are_case_insensitive() {
        let mut metadata = Metadata::new();
        metadata.set("content-type", "application/json");
        assert_eq!(metadata.get("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(metadata.content_type(), Some("application/json"));
        assert_eq!(metadata.keys().collect::<Vec<_>>(), vec!["Content-Type"]);
    }

    #[test]
    fn add_preserves_value_order() {
        let mut metadata = Metadata::new();
        metadata.add("X-Trace", "a");
        metadata.add("x-trace", "b");
        metadata.add("X-TRACE", "c");
        assert_eq!(metadata.values("x-trace"), ["a", "b", "c"]);
        assert_eq!(metadata.get("x-trace"), Some("a"));

        metadata.set("x-trace", "z");
        assert_eq!(metadata.values("x-trace"), ["z"]);

        metadata.del("X-Trace");
        assert!(metadata.values("x-trace").is_empty());
        assert_eq!(metadata.get("x-trace"), None);
    }

    #[test]
    fn malformed_values_read_as_absent() {
        let mut metadata = Metadata::new();
        assert_eq!(metadata.content_length(), None);
        metadata.set(CONTENT_LENGTH_KEY, "twelve");
        assert_eq!(metadata.content_length(), None);
        metadata.set(CONTENT_LENGTH_KEY, "12");
        assert_eq!(metadata.content_length(), Some(12));

        metadata.set(CONTENT_LOCATION_KEY, "relative/path.yaml");
        assert_eq!(metadata.content_location(), None);
    }

    #[test]
    fn content_location_accepts_paths_and_urls() {
        let mut metadata = Metadata::new();
        metadata.set(CONTENT_LOCATION_KEY, "/dev/stdin");
        let url = metadata.content_location().expect("file url");
        assert_eq!(url.scheme(), "file");
        assert_eq!(url.path(), "/dev/stdin");

        metadata.set(CONTENT_LOCATION_KEY, "https://example.com/a.json");
        let url = metadata.content_location().expect("https url");
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn clone_is_independent() {
        let mut original = Metadata::with_options([MetadataOption::content_length(3)]);
        let copy = original.clone();
        original.set(CONTENT_LENGTH_KEY, "99");
        assert_eq!(copy.content_length(), Some(3));
        assert_eq!(original.content_length(), Some(99));
    }

    #[test]
    fn apply_options_is_fluent() {
        let mut metadata = Metadata::new();
        metadata
            .apply_options([MetadataOption::framing_type(&FramingType::Yaml)])
            .apply_options([MetadataOption::add("Via", "one"), MetadataOption::add("via", "two")]);
        assert_eq!(metadata.framing_type(), Some(FramingType::Yaml));
        assert_eq!(metadata.values("VIA").len(), 2);
    }

    #[test]
    fn serializes_as_json_object() {
        let metadata = Metadata::with_options([
            MetadataOption::content_type("application/yaml"),
            MetadataOption::content_length(7),
        ]);
        assert_eq!(
            metadata.to_string(),
            r#"{"Content-Type":["application/yaml"],"Content-Length":["7"]}"#
        );
    }

    #[test]
    fn canonical_key_lowercases_non_token_keys() {
        assert_eq!(canonical_key("x-framing-TYPE"), "X-Framing-Type");
        assert_eq!(canonical_key("Has Space"), "has space");
    }

    #[test]
    fn non_token_keys_are_case_insensitive() {
        let mut metadata = Metadata::new();
        metadata.set("Has Space", "one");
        assert_eq!(metadata.get("has space"), Some("one"));
        assert_eq!(metadata.get("HAS SPACE"), Some("one"));
        metadata.add("has SPACE", "two");
        assert_eq!(metadata.values("Has Space"), ["one", "two"]);
        metadata.del("HAS space");
        assert_eq!(metadata.get("has space"), None);
    }
}
