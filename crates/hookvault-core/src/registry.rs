//! In-memory hook catalog.
//!
//! Loaded once at bootstrap from the host package's bundled definitions
//! file, replaceable wholesale by an owner-privileged bulk update. Guarded by
//! a single mutex; the catalog is small and infrequently mutated, so no
//! finer locking is warranted. This lock is never held while waiting on the
//! store locks.

use crate::error::{Error, Result};
use crate::model::Hook;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

#[derive(Debug)]
pub struct HookRegistry {
    hooks: Mutex<HashMap<String, Hook>>,
}

impl HookRegistry {
    /// Read the bundled definitions file (a JSON array of definitions).
    /// Called exactly once per service lifetime, from the bootstrap step.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        let definitions: Vec<Hook> = serde_json::from_str(&raw)?;

        let mut hooks = HashMap::with_capacity(definitions.len());
        for hook in definitions {
            hooks.insert(hook.id.clone(), hook);
        }

        info!("Loaded hooks={} from {}", hooks.len(), path.display());

        Ok(Self {
            hooks: Mutex::new(hooks),
        })
    }

    /// Build a registry from an in-memory definition list.
    pub fn from_hooks(definitions: Vec<Hook>) -> Self {
        let mut hooks = HashMap::with_capacity(definitions.len());
        for hook in definitions {
            hooks.insert(hook.id.clone(), hook);
        }
        Self {
            hooks: Mutex::new(hooks),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Hook>>> {
        self.hooks
            .lock()
            .map_err(|_| Error::Other("hook registry lock poisoned".to_string()))
    }

    /// Atomically discard all cached definitions and install the given list.
    pub fn replace_all(&self, definitions: Vec<Hook>) -> Result<()> {
        let mut replacement = HashMap::with_capacity(definitions.len());
        for hook in definitions {
            replacement.insert(hook.id.clone(), hook);
        }

        let mut hooks = self.lock()?;
        *hooks = replacement;
        info!("Set hooks={}", hooks.len());
        Ok(())
    }

    /// Cached definition for `id`, if any. Callers treat a missing id as a
    /// logged warning and skip it, never as a fatal condition.
    pub fn get(&self, id: &str) -> Result<Option<Hook>> {
        Ok(self.lock()?.get(id).cloned())
    }

    /// The full catalog, sorted by id for stable output.
    pub fn all(&self) -> Result<Vec<Hook>> {
        let mut all: Vec<Hook> = self.lock()?.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Rewrite the target of a cached definition. This is the single
    /// permitted post-load mutation, used for the dynamic-target backfill.
    /// Returns false if the id is unknown.
    pub fn rewrite_target(&self, id: &str, target: &str) -> Result<bool> {
        let mut hooks = self.lock()?;
        match hooks.get_mut(id) {
            Some(hook) => {
                hook.target = target.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn hook(id: &str, target: &str) -> Hook {
        Hook {
            id: id.into(),
            target: target.into(),
            rule: json!({}),
        }
    }

    #[test]
    fn test_load_from_definitions_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let definitions = json!([
            {"id": "net.dns", "target": "resolver.Client", "rule": {"deny": true}},
            {"id": "fs.read", "target": "io.File"}
        ]);
        write!(file, "{definitions}").unwrap();

        let registry = HookRegistry::load(file.path()).unwrap();
        assert_eq!(registry.len().unwrap(), 2);
        assert_eq!(
            registry.get("net.dns").unwrap().unwrap().target,
            "resolver.Client"
        );
        assert!(registry.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = HookRegistry::load(Path::new("/nonexistent/hooks.json")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_replace_all_discards_previous_catalog() {
        let registry = HookRegistry::from_hooks(vec![hook("a", "t1"), hook("b", "t2")]);
        registry.replace_all(vec![hook("c", "t3")]).unwrap();

        assert_eq!(registry.len().unwrap(), 1);
        assert!(registry.get("a").unwrap().is_none());
        assert!(registry.get("c").unwrap().is_some());
    }

    #[test]
    fn test_all_is_sorted_by_id() {
        let registry = HookRegistry::from_hooks(vec![hook("z", "t"), hook("a", "t"), hook("m", "t")]);
        let ids: Vec<String> = registry.all().unwrap().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }

    #[test]
    fn test_rewrite_target() {
        let registry = HookRegistry::from_hooks(vec![hook("dyn", Hook::DYNAMIC_TARGET)]);
        assert!(registry.rewrite_target("dyn", "impl.Concrete").unwrap());
        assert_eq!(registry.get("dyn").unwrap().unwrap().target, "impl.Concrete");
        assert!(!registry.rewrite_target("missing", "x").unwrap());
    }
}
