//! Settings surface (spec §6): numeric/bool/int-enum keys grouped by
//! namespace, e.g. `Scenario.endTime`, `Group.1.bufferSize`,
//! `Interface.lora.transmitRange`.
//!
//! Grounded in the teacher's `ControlConfig::load` pattern (eager,
//! descriptive failure at load time) but backed by `toml::Value` rather
//! than `serde`-derived structs, since the spec's dotted `Namespace.key` /
//! `Group.<n>.key` surface is ordinary TOML table nesting and the set of
//! groups/interfaces is only known once a scenario file is read (so a fixed
//! `#[derive(Deserialize)]` struct can't describe it up front).

use std::path::Path;

use toml::Value;

use crate::error::SettingsError;

/// A loaded settings tree, keyed by dotted paths (`"Group.1.bufferSize"`).
#[derive(Debug, Clone, Default)]
pub struct Settings {
    root: toml::value::Table,
}

impl Settings {
    pub fn empty() -> Self {
        Settings { root: toml::value::Table::new() }
    }

    pub fn from_str(text: &str) -> Result<Self, SettingsError> {
        let value: Value = toml::from_str(text).map_err(|source| SettingsError::Parse { path: "<inline>".to_string(), source })?;
        match value {
            Value::Table(root) => Ok(Settings { root }),
            _ => Err(SettingsError::Invalid { key: "<root>".to_string(), value: value.to_string(), reason: "top-level settings must be a table".to_string() }),
        }
    }

    /// Load and merge settings from one or more TOML files, in order — a
    /// later file's keys overwrite an earlier file's at the same dotted
    /// path, the same "last file wins" rule the CLI surface (spec §6)
    /// implies for its trailing config-path arguments.
    pub fn load(paths: &[impl AsRef<Path>]) -> Result<Self, SettingsError> {
        let mut merged = Settings::empty();
        for path in paths {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io { path: path.display().to_string(), source })?;
            let value: Value = toml::from_str(&text).map_err(|source| SettingsError::Parse { path: path.display().to_string(), source })?;
            let Value::Table(table) = value else {
                return Err(SettingsError::Invalid { key: "<root>".to_string(), value: path.display().to_string(), reason: "top-level settings must be a table".to_string() });
            };
            merge_tables(&mut merged.root, table);
        }
        Ok(merged)
    }

    fn lookup(&self, dotted_path: &str) -> Option<&Value> {
        let mut current = &self.root;
        let mut parts = dotted_path.split('.').peekable();
        while let Some(part) = parts.next() {
            let value = current.get(part)?;
            if parts.peek().is_none() {
                return Some(value);
            }
            current = value.as_table()?;
        }
        None
    }

    pub fn get_double(&self, key: &str) -> Result<f64, SettingsError> {
        let value = self.lookup(key).ok_or_else(|| SettingsError::Missing(key.to_string()))?;
        value.as_float().or_else(|| value.as_integer().map(|i| i as f64)).ok_or_else(|| Self::invalid(key, value, "expected a number"))
    }

    pub fn get_double_or(&self, key: &str, default: f64) -> f64 {
        self.get_double(key).unwrap_or(default)
    }

    pub fn get_int(&self, key: &str) -> Result<i64, SettingsError> {
        let value = self.lookup(key).ok_or_else(|| SettingsError::Missing(key.to_string()))?;
        value.as_integer().ok_or_else(|| Self::invalid(key, value, "expected an integer"))
    }

    pub fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, SettingsError> {
        let value = self.lookup(key).ok_or_else(|| SettingsError::Missing(key.to_string()))?;
        value.as_bool().ok_or_else(|| Self::invalid(key, value, "expected a boolean"))
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str) -> Result<String, SettingsError> {
        let value = self.lookup(key).ok_or_else(|| SettingsError::Missing(key.to_string()))?;
        value.as_str().map(|s| s.to_string()).ok_or_else(|| Self::invalid(key, value, "expected a string"))
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    pub fn get_int_list(&self, key: &str) -> Result<Vec<i64>, SettingsError> {
        let value = self.lookup(key).ok_or_else(|| SettingsError::Missing(key.to_string()))?;
        let array = value.as_array().ok_or_else(|| Self::invalid(key, value, "expected an array"))?;
        array.iter().map(|v| v.as_integer().ok_or_else(|| Self::invalid(key, v, "expected an integer"))).collect()
    }

    /// An integer-code enum setting (spec §6's `cachingPrioritizationStrategy`,
    /// `messageForwardingOrderStrategy`, `subDisMode`, ...), validated to lie
    /// in `0..=max_code`.
    pub fn get_enum_code(&self, key: &str, max_code: u8) -> Result<u8, SettingsError> {
        let raw = self.get_int(key)?;
        if raw < 0 || raw > max_code as i64 {
            return Err(SettingsError::Invalid { key: key.to_string(), value: raw.to_string(), reason: format!("must be in 0..={max_code}") });
        }
        Ok(raw as u8)
    }

    /// The dotted names of every direct child table under `namespace`
    /// (e.g. `group_names("Group")` returns `["1", "2", ...]`, used to
    /// discover how many host groups a scenario defines).
    pub fn child_table_names(&self, namespace: &str) -> Vec<String> {
        match self.lookup(namespace).and_then(Value::as_table) {
            Some(table) => {
                let mut names: Vec<String> = table.iter().filter(|(_, v)| v.is_table()).map(|(k, _)| k.clone()).collect();
                names.sort();
                names
            }
            None => Vec::new(),
        }
    }

    fn invalid(key: &str, value: &Value, reason: &str) -> SettingsError {
        SettingsError::Invalid { key: key.to_string(), value: value.to_string(), reason: reason.to_string() }
    }
}

fn merge_tables(base: &mut toml::value::Table, overlay: toml::value::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(base_table)), Value::Table(overlay_table)) => {
                merge_tables(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
