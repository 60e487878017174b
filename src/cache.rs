//! Content-addressed layout cache.
//!
//! One file per digest key under the cache directory; entries are
//! immutable once published. Writes land in a temporary file first and
//! are renamed into place, so a concurrent reader observes either
//! nothing or a complete entry, never a partial write.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::error::LayoutError;
use crate::graph::model::LayoutResult;

pub struct ResultCache {
    dir: PathBuf,
}

impl ResultCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Platform default: `<cache_dir>/force-layout`.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|mut p| {
            p.push("force-layout");
            p
        })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("layout_{key}.json"))
    }

    /// `Ok(None)` when the key was never stored. Read or decode failures
    /// surface as `CacheUnavailable`; callers recompute instead of
    /// failing the request.
    pub fn get(&self, key: &str) -> Result<Option<LayoutResult>, LayoutError> {
        let path = self.entry_path(key);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LayoutError::CacheUnavailable(format!(
                    "read {}: {e}",
                    path.display()
                )))
            }
        };
        serde_json::from_str(&contents).map(Some).map_err(|e| {
            LayoutError::CacheUnavailable(format!("decode {}: {e}", path.display()))
        })
    }

    /// Publishes atomically: serialize, write a dot-tmp sibling, rename
    /// onto the final name. An entry is created once per key and never
    /// mutated afterwards.
    pub fn put(&self, key: &str, result: &LayoutResult) -> Result<(), LayoutError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            LayoutError::CacheUnavailable(format!("create {}: {e}", self.dir.display()))
        })?;

        let body = serde_json::to_string(result)
            .map_err(|e| LayoutError::CacheUnavailable(format!("encode entry {key}: {e}")))?;

        let tmp = self.dir.join(format!(".{key}.tmp"));
        fs::write(&tmp, body).map_err(|e| {
            LayoutError::CacheUnavailable(format!("write {}: {e}", tmp.display()))
        })?;

        let path = self.entry_path(key);
        fs::rename(&tmp, &path).map_err(|e| {
            LayoutError::CacheUnavailable(format!("publish {}: {e}", path.display()))
        })?;
        Ok(())
    }

    /// Whether an entry has been published for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entry_path(key).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scratch_dir(label: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "force-layout-cache-{label}-{}-{n}",
            std::process::id()
        ))
    }

    fn sample() -> LayoutResult {
        let mut result = LayoutResult::new();
        result.insert("n1".into(), [1.0, 2.0]);
        result.insert("n2".into(), [-3.5, 0.25]);
        result
    }

    #[test]
    fn missing_key_is_a_clean_miss() {
        let cache = ResultCache::new(scratch_dir("miss"));
        assert!(cache.get("0000").unwrap().is_none());
        assert!(!cache.contains("0000"));
    }

    #[test]
    fn roundtrips_an_entry() {
        let cache = ResultCache::new(scratch_dir("roundtrip"));
        let result = sample();
        cache.put("abc", &result).unwrap();
        assert!(cache.contains("abc"));
        assert_eq!(cache.get("abc").unwrap(), Some(result));
    }

    #[test]
    fn stores_the_exact_data_object() {
        // The entry must be the serialized coordinate map itself,
        // retrievable with no further transformation.
        let dir = scratch_dir("exact");
        let cache = ResultCache::new(dir.clone());
        let result = sample();
        cache.put("abc", &result).unwrap();
        let on_disk = fs::read_to_string(dir.join("layout_abc.json")).unwrap();
        assert_eq!(on_disk, serde_json::to_string(&result).unwrap());
    }

    #[test]
    fn no_temporary_survives_a_publish() {
        let dir = scratch_dir("tmp");
        let cache = ResultCache::new(dir.clone());
        cache.put("abc", &sample()).unwrap();
        let leftovers: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn corrupt_entry_reports_unavailable() {
        let dir = scratch_dir("corrupt");
        let cache = ResultCache::new(dir.clone());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("layout_bad.json"), "{not json").unwrap();
        assert!(matches!(
            cache.get("bad"),
            Err(LayoutError::CacheUnavailable(_))
        ));
    }
}
