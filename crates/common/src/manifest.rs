//! Package manifests
//!
//! A [`PackageManifest`] maps each content-bearing relative path of a
//! package to the SHA-256 digest of its bytes. The aggregate digest reduces
//! the whole mapping to one value that changes exactly when some file's
//! content, or the set of paths, changes.
//!
//! Serialized form is a flat JSON object of path to hex digest, with no
//! version field:
//!
//! ```json
//! {"a.txt":"2cf2...9824","b/c.txt":"486e...b8a7"}
//! ```

use crate::digest::StreamDigester;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Path to digest mapping for one package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageManifest {
    digests: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Create an empty manifest
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a pre-built mapping
    pub fn from_map(digests: BTreeMap<String, String>) -> Self {
        Self { digests }
    }

    /// Read-only view of the mapping
    pub fn digests_by_path(&self) -> &BTreeMap<String, String> {
        &self.digests
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.digests.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// The `"<path>:<digest>"` lines in aggregate order
    fn sorted_entries(&self) -> Vec<String> {
        let mut entries: Vec<String> = self
            .digests
            .iter()
            .map(|(path, digest)| format!("{}:{}", path, digest))
            .collect();

        // UTF-16 code unit order, which other manifest clients sort by
        entries.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));
        entries
    }

    /// Digest of the sorted entry list rendered as a JSON array of strings
    pub fn compute_aggregate_digest(&self) -> String {
        let entries = self.sorted_entries();
        let canonical = serde_json::to_string(&entries).unwrap_or_else(|_| "[]".to_string());
        StreamDigester::digest_bytes(canonical.as_bytes())
    }

    /// Flat JSON object of path to digest
    pub fn serialize(&self) -> String {
        serde_json::to_string(&self.digests).unwrap_or_else(|_| "{}".to_string())
    }

    /// Parse the output of [`PackageManifest::serialize`].
    ///
    /// Never fails: text that is not a JSON object yields an empty manifest,
    /// since a missing or unreadable manifest is a normal prior state.
    /// Members whose values are not strings are dropped.
    pub fn deserialize(text: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                debug!("Treating unparseable manifest as empty: {}", e);
                return Self::new();
            }
        };

        let serde_json::Value::Object(members) = value else {
            debug!("Treating non-object manifest as empty");
            return Self::new();
        };

        let mut digests = BTreeMap::new();
        for (path, value) in members {
            match value {
                serde_json::Value::String(digest) => {
                    digests.insert(path, digest);
                }
                other => warn!("Dropping manifest entry {} with non-string value {}", path, other),
            }
        }

        Self { digests }
    }

    /// Paths that differ between `self` (old) and `other` (new)
    pub fn diff(&self, other: &PackageManifest) -> ManifestDiff {
        let mut diff = ManifestDiff::default();

        for (path, digest) in &other.digests {
            match self.digests.get(path) {
                None => diff.added.push(path.clone()),
                Some(old) if old != digest => diff.changed.push(path.clone()),
                Some(_) => {}
            }
        }

        diff.removed = self
            .digests
            .keys()
            .filter(|path| !other.digests.contains_key(*path))
            .cloned()
            .collect();

        diff
    }
}

impl FromIterator<(String, String)> for PackageManifest {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            digests: iter.into_iter().collect(),
        }
    }
}

/// Difference between two manifests, each list sorted by path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl ManifestDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
    const WORLD: &str = "486ea46224d1bb4fb680f34f7c9ad96a8f24ec88be73ea8e5a6c65260e9cb8a7";

    fn manifest(pairs: &[(&str, &str)]) -> PackageManifest {
        pairs
            .iter()
            .map(|(p, d)| (p.to_string(), d.to_string()))
            .collect()
    }

    #[test]
    fn test_aggregate_is_order_independent() {
        let a = manifest(&[("a.txt", HELLO), ("b/c.txt", WORLD), ("z", HELLO)]);
        let b = manifest(&[("z", HELLO), ("b/c.txt", WORLD), ("a.txt", HELLO)]);
        assert_eq!(a.compute_aggregate_digest(), b.compute_aggregate_digest());
    }

    #[test]
    fn test_aggregate_known_layout() {
        let m = manifest(&[("b/c.txt", WORLD), ("a.txt", HELLO)]);
        let canonical = format!(r#"["a.txt:{}","b/c.txt:{}"]"#, HELLO, WORLD);
        assert_eq!(
            m.compute_aggregate_digest(),
            StreamDigester::digest_bytes(canonical.as_bytes())
        );
    }

    #[test]
    fn test_aggregate_of_empty_manifest() {
        assert_eq!(
            PackageManifest::new().compute_aggregate_digest(),
            StreamDigester::digest_bytes(b"[]")
        );
    }

    #[test]
    fn test_aggregate_changes_with_content() {
        let a = manifest(&[("a.txt", HELLO)]);
        let b = manifest(&[("a.txt", WORLD)]);
        assert_ne!(a.compute_aggregate_digest(), b.compute_aggregate_digest());
    }

    #[test]
    fn test_aggregate_sorts_by_utf16_units() {
        // U+FF21 sorts after U+1F600 in UTF-8 byte order but before it in
        // UTF-16 unit order.
        let m = manifest(&[("\u{1F600}", HELLO), ("\u{FF21}", WORLD)]);
        assert_eq!(
            m.sorted_entries(),
            vec![format!("\u{1F600}:{}", HELLO), format!("\u{FF21}:{}", WORLD)]
        );
    }

    #[test]
    fn test_serialize_flat_object() {
        let m = manifest(&[("b/c.txt", WORLD), ("a.txt", HELLO)]);
        assert_eq!(
            m.serialize(),
            format!(r#"{{"a.txt":"{}","b/c.txt":"{}"}}"#, HELLO, WORLD)
        );
    }

    #[test]
    fn test_round_trip() {
        let m = manifest(&[("a.txt", HELLO), ("dir/with space/ü.txt", WORLD)]);
        assert_eq!(PackageManifest::deserialize(&m.serialize()), m);
    }

    #[test]
    fn test_tolerant_parsing() {
        assert!(PackageManifest::deserialize("not json").is_empty());
        assert!(PackageManifest::deserialize("").is_empty());
        assert!(PackageManifest::deserialize("null").is_empty());
        assert!(PackageManifest::deserialize("[\"a.txt\"]").is_empty());
        assert!(PackageManifest::deserialize("42").is_empty());
    }

    #[test]
    fn test_non_string_values_dropped() {
        let m = PackageManifest::deserialize(r#"{"a.txt":"abc","b.txt":1,"c":{"d":"e"}}"#);
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("a.txt"), Some("abc"));
    }

    #[test]
    fn test_diff() {
        let old = manifest(&[("keep", HELLO), ("edit", HELLO), ("gone", HELLO)]);
        let new = manifest(&[("keep", HELLO), ("edit", WORLD), ("new", WORLD)]);

        let diff = old.diff(&new);
        assert_eq!(diff.added, vec!["new"]);
        assert_eq!(diff.removed, vec!["gone"]);
        assert_eq!(diff.changed, vec!["edit"]);
        assert!(!diff.is_empty());
        assert!(new.diff(&new).is_empty());
    }
}
