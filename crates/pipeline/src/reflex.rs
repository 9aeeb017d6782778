//! Pre-rendered canned responses.
//!
//! Loaded once at process start and immutable afterwards; every call
//! shares the store by reference. Assets are raw PCM16 at the
//! synthesis sample rate and go through the normal outbound transcode
//! path, keyed by file stem.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::PipelineError;

#[derive(Default)]
pub struct ReflexStore {
    assets: HashMap<String, Arc<Vec<u8>>>,
}

impl ReflexStore {
    /// Empty store: every reflex lookup misses and the turn falls
    /// back to aborting cleanly.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every `.pcm`/`.raw` file directly under `dir`.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| PipelineError::Asset(format!("{}: {e}", dir.display())))?;

        let mut assets = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::Asset(e.to_string()))?;
            let path = entry.path();
            let is_pcm = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e, "pcm" | "raw"));
            if !is_pcm {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let bytes = std::fs::read(&path)
                .map_err(|e| PipelineError::Asset(format!("{}: {e}", path.display())))?;
            tracing::debug!(asset = stem, bytes = bytes.len(), "loaded reflex asset");
            assets.insert(stem.to_string(), Arc::new(bytes));
        }

        tracing::info!(count = assets.len(), dir = %dir.display(), "reflex assets loaded");
        Ok(Self { assets })
    }

    /// Register an asset directly (tests and programmatic setup).
    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.assets.insert(name.into(), Arc::new(bytes));
    }

    /// Look up an asset. A miss is not an error; callers log and skip.
    pub fn get(&self, name: &str) -> Option<Arc<Vec<u8>>> {
        self.assets.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_dir_keys_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("greeting.pcm")).unwrap();
        f.write_all(&[1u8; 320]).unwrap();
        let mut f = std::fs::File::create(dir.path().join("notes.txt")).unwrap();
        f.write_all(b"not audio").unwrap();

        let store = ReflexStore::load_dir(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("greeting").unwrap().len(), 320);
        assert!(store.get("notes").is_none());
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        assert!(ReflexStore::load_dir("/definitely/not/here").is_err());
    }

    #[test]
    fn test_miss_returns_none() {
        let store = ReflexStore::empty();
        assert!(store.get("anything").is_none());
    }
}
