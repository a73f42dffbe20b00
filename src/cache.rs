use camino::Utf8Path;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use tracing::debug;

use crate::error::{Error, Result};

/// IP address to owner-description store, persisted as a JSON object.
///
/// The cache is an explicit value owned by the caller and lent to the
/// resolver; nothing in the library keeps it in global state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OwnershipCache {
    entries: FxHashMap<String, String>,
}

impl OwnershipCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn contains(&self, ip: &str) -> bool {
        self.entries.contains_key(ip)
    }

    #[inline]
    pub fn get(&self, ip: &str) -> Option<&str> {
        self.entries.get(ip).map(String::as_str)
    }

    /// Insert or overwrite the owner of `ip`.
    #[inline]
    pub fn put(&mut self, ip: impl Into<String>, owner: impl Into<String>) {
        self.entries.insert(ip.into(), owner.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge the entries persisted at `path` into this cache.
    ///
    /// A missing file is not an error and merges nothing. On a read or parse
    /// failure the cache is left exactly as it was. Returns the number of
    /// entries read from the file.
    pub fn load(&mut self, path: &Utf8Path) -> Result<usize> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(%path, "no cache file, starting empty");
                return Ok(0);
            }
            Err(source) => {
                return Err(Error::CacheRead {
                    path: path.to_owned(),
                    source,
                })
            }
        };

        let loaded: FxHashMap<String, String> =
            serde_json::from_slice(&bytes).map_err(|source| Error::CacheParse {
                path: path.to_owned(),
                source,
            })?;

        let count = loaded.len();
        self.entries.extend(loaded);
        Ok(count)
    }

    /// Write the full mapping to `path` as indented JSON, replacing whatever
    /// the file held before. Keys are written in sorted order.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        let sorted: BTreeMap<&str, &str> = self.iter().collect();
        let mut json = serde_json::to_vec_pretty(&sorted).map_err(Error::CacheEncode)?;
        json.push(b'\n');

        fs::write(path, json).map_err(|source| Error::CacheWrite {
            path: path.to_owned(),
            source,
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OwnershipCache {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
    }

    #[test]
    fn put_then_get() {
        let mut cache = OwnershipCache::new();
        assert!(!cache.contains("1.1.1.1"));
        assert_eq!(cache.get("1.1.1.1"), None);

        cache.put("1.1.1.1", "AU / Cloudflare, Inc.");
        assert!(cache.contains("1.1.1.1"));
        assert_eq!(cache.get("1.1.1.1"), Some("AU / Cloudflare, Inc."));

        cache.put("1.1.1.1", "- / -");
        assert_eq!(cache.get("1.1.1.1"), Some("- / -"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "cache.json");

        let cache: OwnershipCache = [
            ("91.210.181.37", "SK / Digmia s.r.o."),
            ("192.168.0.1", "- / -"),
            ("8.8.8.8", "US / Google LLC \"quoted\" \\ slash"),
        ]
        .into_iter()
        .collect();
        cache.save(&path).unwrap();

        let mut loaded = OwnershipCache::new();
        assert_eq!(loaded.load(&path).unwrap(), 3);
        assert_eq!(loaded, cache);
    }

    #[test]
    fn empty_cache_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "cache.json");

        OwnershipCache::new().save(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "{}");

        let mut loaded = OwnershipCache::new();
        assert_eq!(loaded.load(&path).unwrap(), 0);
        assert!(loaded.is_empty());
    }

    #[test]
    fn save_is_indented_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "cache.json");
        fs::write(&path, "{\"9.9.9.9\": \"stale\", \"garbage\": \"x\"}").unwrap();

        let cache: OwnershipCache = [("1.1.1.1", "AU / Cloudflare")].into_iter().collect();
        cache.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"1.1.1.1\": \"AU / Cloudflare\"\n}\n");
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = OwnershipCache::new();
        assert_eq!(cache.load(&temp_path(&dir, "absent.json")).unwrap(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn bad_file_leaves_prior_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "cache.json");
        fs::write(&path, "[\"not\", \"an\", \"object\"]").unwrap();

        let mut cache: OwnershipCache = [("10.0.0.1", "- / -")].into_iter().collect();
        let before = cache.clone();

        let err = cache.load(&path).unwrap_err();
        assert!(matches!(err, Error::CacheParse { .. }));
        assert_eq!(cache, before);
    }

    #[test]
    fn load_merges_over_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "cache.json");
        fs::write(&path, "{\"10.0.0.1\": \"new\", \"10.0.0.2\": \"other\"}").unwrap();

        let mut cache: OwnershipCache = [("10.0.0.1", "old"), ("10.0.0.3", "kept")]
            .into_iter()
            .collect();
        assert_eq!(cache.load(&path).unwrap(), 2);

        assert_eq!(cache.get("10.0.0.1"), Some("new"));
        assert_eq!(cache.get("10.0.0.2"), Some("other"));
        assert_eq!(cache.get("10.0.0.3"), Some("kept"));
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(200))]

        /// Property: any string mapping survives save then load unchanged
        #[test]
        fn prop_save_load_round_trips(
            entries in proptest::collection::hash_map(".*", ".*", 0..64)
        ) {
            let dir = tempfile::tempdir().unwrap();
            let path = temp_path(&dir, "cache.json");

            let cache: OwnershipCache = entries.into_iter().collect();
            cache.save(&path).unwrap();

            let mut loaded = OwnershipCache::new();
            proptest::prop_assert_eq!(loaded.load(&path).unwrap(), cache.len());
            proptest::prop_assert_eq!(loaded, cache);
        }

        /// Property: loading merges file entries over what is already cached
        #[test]
        fn prop_load_merges(
            existing in proptest::collection::hash_map("[0-9.]{1,15}", ".*", 0..16),
            saved in proptest::collection::hash_map("[0-9.]{1,15}", ".*", 0..16),
        ) {
            let dir = tempfile::tempdir().unwrap();
            let path = temp_path(&dir, "cache.json");
            saved.iter().collect::<OwnershipCache>().save(&path).unwrap();

            let mut cache: OwnershipCache = existing.iter().collect();
            cache.load(&path).unwrap();

            let mut expected = existing;
            expected.extend(saved);
            proptest::prop_assert_eq!(cache, expected.into_iter().collect::<OwnershipCache>());
        }
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "missing/dir/cache.json");
        let err = OwnershipCache::new().save(&path).unwrap_err();
        assert!(matches!(err, Error::CacheWrite { .. }));
    }
}
