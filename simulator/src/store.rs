//! File-backed rule persistence.
//!
//! The rules file is the sole source of truth: callers re-load it at the
//! start of every operation and never cache rule state across requests.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fw_filter::Rule;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// JSON-file rule store with a single writer lock.
///
/// Writes land in a sibling temp file followed by an atomic rename, so a
/// concurrent `load` sees either the fully-old or fully-new file, never a
/// truncated one. Plain reads are lock-free; read-modify-write cycles must
/// hold [`RuleStore::write_lock`] across load, mutate and save.
pub struct RuleStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RuleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize mutations against this store.
    pub async fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// Load the current rule set.
    ///
    /// A missing or malformed file yields an empty set; the caller decides
    /// whether that is fatal.
    pub fn load(&self) -> Vec<Rule> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Rules file {:?} not found, treating as empty", self.path);
                return Vec::new();
            }
            Err(e) => {
                warn!("Rules file {:?} unreadable ({}), treating as empty", self.path, e);
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(rules) => rules,
            Err(e) => {
                warn!("Rules file {:?} is not valid JSON ({}), treating as empty", self.path, e);
                Vec::new()
            }
        }
    }

    /// Persist the rule set, overwriting the file atomically.
    ///
    /// On failure the previous file contents are left intact.
    pub fn save(&self, rules: &[Rule]) -> Result<()> {
        let json = serde_json::to_string_pretty(rules).context("Failed to serialize rules")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes()).with_context(|| format!("Failed to write {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {:?}", self.path))?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use fw_filter::Action;

    fn rule(ip: &str, port: u16, action: Action, description: Option<&str>) -> Rule {
        Rule {
            ip: ip.to_string(),
            port,
            action,
            description: description.map(str::to_string),
        }
    }

    fn store_in(dir: &tempfile::TempDir) -> RuleStore {
        RuleStore::new(dir.path().join("rules.json"))
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store_in(&dir).load().is_empty());
    }

    #[test]
    fn test_load_malformed_json_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_save_load_round_trip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let rules = vec![
            rule("8.8.8.8", 53, Action::Permit, Some("Google DNS")),
            rule("10.0.0.5", 22, Action::Block, None),
            rule("8.8.8.8", 53, Action::Block, None), // duplicate is legal on disk
        ];
        store.save(&rules).unwrap();
        assert_eq!(store.load(), rules);
    }

    #[test]
    fn test_save_of_loaded_set_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let rules = vec![rule("1.1.1.1", 443, Action::Permit, None)];
        store.save(&rules).unwrap();
        let first = fs::read_to_string(store.path()).unwrap();

        store.save(&store.load()).unwrap();
        let second = fs::read_to_string(store.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&[rule("1.2.3.4", 80, Action::Permit, None)]).unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec!["rules.json"]);
    }

    #[test]
    fn test_save_is_human_readable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&[rule("1.2.3.4", 80, Action::Permit, None)]).unwrap();
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n  {"), "expected 2-space indented JSON: {raw}");
    }
}
