// ─── Enabled Map ───
// In-memory form of `enabledmods.json`:
//   { "Version": 1, "<mod name>": { "<mod version>": true|false } }

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::core::modpack::compare_versions;

pub const SCHEMA_KEY: &str = "Version";
pub const SCHEMA_VERSION: u64 = 1;
/// Version key used for legacy flat `"Mod": true` entries.
pub const LEGACY_VERSION_KEY: &str = "0.0.0";

pub type VersionStates = BTreeMap<String, bool>;

#[derive(Debug, Clone, PartialEq)]
pub struct EnabledMap {
    pub schema_version: u64,
    pub mods: BTreeMap<String, VersionStates>,
}

impl Default for EnabledMap {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            mods: BTreeMap::new(),
        }
    }
}

/// How the effective enabled flag for an installed mod version was decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub enabled: bool,
    /// The map was modified and must be written back.
    pub dirty: bool,
}

impl EnabledMap {
    /// Parse the on-disk JSON, ignoring values that are neither version maps
    /// nor legacy booleans.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let root: Map<String, Value> = serde_json::from_str(raw)?;
        let mut map = EnabledMap::default();

        for (key, value) in root {
            if key == SCHEMA_KEY {
                if let Some(v) = value.as_u64() {
                    map.schema_version = v;
                }
                continue;
            }
            match value {
                Value::Object(versions) => {
                    let states = versions
                        .into_iter()
                        .filter_map(|(version, flag)| flag.as_bool().map(|b| (version, b)))
                        .collect();
                    map.mods.insert(key, states);
                }
                Value::Bool(flag) => {
                    map.mods
                        .insert(key, BTreeMap::from([(LEGACY_VERSION_KEY.to_string(), flag)]));
                }
                _ => {}
            }
        }

        Ok(map)
    }

    pub fn get(&self, name: &str) -> Option<&VersionStates> {
        self.mods.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.mods.contains_key(name)
    }

    pub fn any_enabled(&self, name: &str) -> bool {
        self.mods
            .get(name)
            .map(|states| states.values().any(|v| *v))
            .unwrap_or(false)
    }

    /// Move entries recorded under a legacy folder key to the canonical name.
    /// Returns `true` when a migration happened.
    pub fn migrate_key(&mut self, from: &str, to: &str) -> bool {
        if from == to || self.mods.contains_key(to) {
            return false;
        }
        match self.mods.remove(from) {
            Some(states) => {
                self.mods.insert(to.to_string(), states);
                true
            }
            None => false,
        }
    }

    /// Clear every version of `name` to false, then set `version` to `enabled`.
    /// Guarantees at most one `true` entry under `name`.
    pub fn set_exclusive(&mut self, name: &str, version: &str, enabled: bool) {
        let states = self.mods.entry(name.to_string()).or_default();
        for flag in states.values_mut() {
            *flag = false;
        }
        states.insert(version.to_string(), enabled);
    }

    /// Set every recorded version of `name` to false. Returns whether the
    /// mod had any entries.
    pub fn disable_all_versions(&mut self, name: &str) -> bool {
        match self.mods.get_mut(name) {
            Some(states) => {
                for flag in states.values_mut() {
                    *flag = false;
                }
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.mods.remove(name).is_some()
    }

    /// Decide whether the installed `version` of `name` is enabled, applying
    /// the bookkeeping rules:
    ///
    /// 1. several `true` versions collapse to one (installed version if it is
    ///    true, otherwise the highest true version);
    /// 2. an explicit entry for the installed version wins;
    /// 3. otherwise a `true` entry for another version carries over to the
    ///    installed version (the old entry is cleared);
    /// 4. otherwise the mod is disabled.
    ///
    /// A missing entry for `name` is initialised as empty (disabled).
    pub fn resolve(&mut self, name: &str, version: &str) -> Resolution {
        let mut dirty = false;
        let states = self.mods.entry(name.to_string()).or_insert_with(|| {
            dirty = true;
            BTreeMap::new()
        });

        let true_versions: Vec<String> = states
            .iter()
            .filter(|(_, flag)| **flag)
            .map(|(v, _)| v.clone())
            .collect();

        if true_versions.len() > 1 {
            let keep = if states.get(version) == Some(&true) {
                version.to_string()
            } else {
                highest_version(&true_versions)
            };
            for (v, flag) in states.iter_mut() {
                if *v != keep {
                    *flag = false;
                }
            }
            dirty = true;
        }

        if let Some(explicit) = states.get(version) {
            return Resolution {
                enabled: *explicit,
                dirty,
            };
        }

        if states.values().any(|flag| *flag) {
            for flag in states.values_mut() {
                *flag = false;
            }
            states.insert(version.to_string(), true);
            return Resolution {
                enabled: true,
                dirty: true,
            };
        }

        Resolution {
            enabled: false,
            dirty,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        root.insert(SCHEMA_KEY.to_string(), Value::from(self.schema_version));
        for (name, states) in &self.mods {
            let versions: Map<String, Value> = states
                .iter()
                .map(|(v, flag)| (v.clone(), Value::Bool(*flag)))
                .collect();
            root.insert(name.clone(), Value::Object(versions));
        }
        Value::Object(root)
    }
}

impl Serialize for EnabledMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn highest_version(versions: &[String]) -> String {
    versions
        .iter()
        .max_by(|a, b| match compare_versions(a, b) {
            Ordering::Equal => a.cmp(b),
            other => other,
        })
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(raw: &str) -> EnabledMap {
        EnabledMap::from_json(raw).unwrap()
    }

    #[test]
    fn parses_versioned_and_legacy_entries() {
        let parsed = map(r#"{ "Version": 1, "A": { "1.0.0": true }, "B": false, "C": "x" }"#);
        assert_eq!(parsed.schema_version, 1);
        assert_eq!(parsed.get("A").unwrap().get("1.0.0"), Some(&true));
        assert_eq!(parsed.get("B").unwrap().get(LEGACY_VERSION_KEY), Some(&false));
        assert!(!parsed.contains("C"));
    }

    #[test]
    fn set_exclusive_leaves_exactly_one_true() {
        let mut m = map(r#"{ "A": { "1.0.0": true, "1.1.0": true, "0.9": false } }"#);
        m.set_exclusive("A", "2.0.0", true);

        let states = m.get("A").unwrap();
        let trues: Vec<_> = states.iter().filter(|(_, f)| **f).collect();
        assert_eq!(trues.len(), 1);
        assert_eq!(trues[0].0, "2.0.0");
    }

    #[test]
    fn explicit_entry_for_installed_version_wins() {
        let mut m = map(r#"{ "A": { "1.0.0": false, "0.9.0": true } }"#);
        let res = m.resolve("A", "1.0.0");
        assert!(!res.enabled);
        assert!(!res.dirty);
    }

    #[test]
    fn version_bump_carries_enabled_state_forward() {
        let mut m = map(r#"{ "A": { "1.0.0": true } }"#);
        let res = m.resolve("A", "1.1.0");
        assert_eq!(
            res,
            Resolution {
                enabled: true,
                dirty: true
            }
        );
        assert_eq!(m.get("A").unwrap().get("1.1.0"), Some(&true));
        assert_eq!(m.get("A").unwrap().get("1.0.0"), Some(&false));
    }

    #[test]
    fn unknown_mod_is_initialised_disabled() {
        let mut m = EnabledMap::default();
        let res = m.resolve("New", "1.0.0");
        assert!(!res.enabled);
        assert!(res.dirty);
        assert!(m.contains("New"));
    }

    #[test]
    fn multiple_true_versions_collapse_to_highest() {
        let mut m = map(r#"{ "A": { "1.2.0": true, "1.10.0": true, "1.9.0": true } }"#);
        let res = m.resolve("A", "2.0.0");
        assert!(res.enabled);
        assert!(res.dirty);
        // The surviving entry moved onto the installed version.
        let states = m.get("A").unwrap();
        assert_eq!(states.values().filter(|f| **f).count(), 1);
        assert_eq!(states.get("2.0.0"), Some(&true));
        assert_eq!(states.get("1.10.0"), Some(&false));
    }

    #[test]
    fn multiple_true_versions_prefer_installed_one() {
        let mut m = map(r#"{ "A": { "1.0.0": true, "3.0.0": true } }"#);
        let res = m.resolve("A", "1.0.0");
        assert!(res.enabled);
        let states = m.get("A").unwrap();
        assert_eq!(states.get("1.0.0"), Some(&true));
        assert_eq!(states.get("3.0.0"), Some(&false));
    }

    #[test]
    fn migrate_key_moves_folder_entry_to_canonical_name() {
        let mut m = map(r#"{ "pilot-folder": { "1.0.0": true } }"#);
        assert!(m.migrate_key("pilot-folder", "Pilot.Mod"));
        assert!(!m.contains("pilot-folder"));
        assert!(m.any_enabled("Pilot.Mod"));
        assert!(!m.migrate_key("pilot-folder", "Pilot.Mod"));
    }

    #[test]
    fn serializes_with_schema_version() {
        let mut m = EnabledMap::default();
        m.set_exclusive("A", "1.0.0", true);
        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["Version"], 1);
        assert_eq!(value["A"]["1.0.0"], true);
    }
}
