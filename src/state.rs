use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Persisted set of already-announced sale ids (order hashes).
///
/// Stored as a JSON array of strings. Insertion order is preserved so the
/// on-disk representation stays stable across rewrites. The whole file is
/// reloaded at the start of each poll cycle and rewritten in full after
/// every successful post — there are no partial writes.
pub struct ProcessedSales {
    path: PathBuf,
    ids: Vec<String>,
}

impl ProcessedSales {
    /// Load the announced-id list from `path`. A missing file yields an
    /// empty set.
    pub fn load(path: &Path) -> Result<Self> {
        let ids = match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            ids,
        })
    }

    /// Seed an empty list file if none exists yet.
    pub fn ensure_exists(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, "[]")
                .with_context(|| format!("failed to create {}", path.display()))?;
        }
        Ok(())
    }

    /// Whether `id` has already been announced.
    ///
    /// An empty id is never a duplicate: records that arrive without an
    /// order hash are re-announced every time discovery surfaces them.
    pub fn contains(&self, id: &str) -> bool {
        !id.is_empty() && self.ids.iter().any(|known| known == id)
    }

    /// Record `id` as announced and rewrite the file immediately.
    /// Empty ids are not recorded (see [`ProcessedSales::contains`]).
    pub fn mark(&mut self, id: &str) -> Result<()> {
        if id.is_empty() || self.contains(id) {
            return Ok(());
        }
        self.ids.push(id.to_string());
        self.save()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn save(&self) -> Result<()> {
        let contents = serde_json::to_string(&self.ids).context("failed to serialize id list")?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sales-bot-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn missing_file_loads_empty() {
        let path = temp_path("missing");
        let _ = std::fs::remove_file(&path);
        let store = ProcessedSales::load(&path).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn mark_persists_and_reload_sees_it() {
        let path = temp_path("roundtrip");
        let _ = std::fs::remove_file(&path);

        let mut store = ProcessedSales::load(&path).unwrap();
        store.mark("0xaaa").unwrap();
        store.mark("0xbbb").unwrap();
        assert!(store.contains("0xaaa"));

        let reloaded = ProcessedSales::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("0xaaa"));
        assert!(reloaded.contains("0xbbb"));
        assert!(!reloaded.contains("0xccc"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn order_is_preserved_on_disk() {
        let path = temp_path("order");
        let _ = std::fs::remove_file(&path);

        let mut store = ProcessedSales::load(&path).unwrap();
        store.mark("first").unwrap();
        store.mark("second").unwrap();
        store.mark("third").unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let ids: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(ids, vec!["first", "second", "third"]);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn empty_id_is_never_a_duplicate() {
        let path = temp_path("empty-id");
        let _ = std::fs::remove_file(&path);

        let mut store = ProcessedSales::load(&path).unwrap();
        store.mark("").unwrap();
        assert!(!store.contains(""));
        assert!(store.is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn mark_is_idempotent() {
        let path = temp_path("idempotent");
        let _ = std::fs::remove_file(&path);

        let mut store = ProcessedSales::load(&path).unwrap();
        store.mark("0xaaa").unwrap();
        store.mark("0xaaa").unwrap();
        assert_eq!(store.len(), 1);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn ensure_exists_seeds_empty_list() {
        let path = temp_path("seed");
        let _ = std::fs::remove_file(&path);

        ProcessedSales::ensure_exists(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");

        // a second call must not clobber existing contents
        std::fs::write(&path, r#"["kept"]"#).unwrap();
        ProcessedSales::ensure_exists(&path).unwrap();
        let store = ProcessedSales::load(&path).unwrap();
        assert!(store.contains("kept"));

        let _ = std::fs::remove_file(&path);
    }
}
