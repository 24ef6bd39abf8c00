//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::ConclaveSettings;

/// Resolve the path to the settings file (`~/.conclave/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".conclave").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ConclaveSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a malformed file is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ConclaveSettings> {
    let mut settings = read_layers(path)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    settings.validate()?;
    Ok(settings)
}

fn read_layers(path: &Path) -> Result<ConclaveSettings> {
    let defaults = serde_json::to_value(ConclaveSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `CONCLAVE_*` overrides using `lookup` to read variables.
///
/// Invalid values are ignored with a warning.
pub fn apply_overrides(settings: &mut ConclaveSettings, lookup: impl Fn(&str) -> Option<String>) {
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let ranged = |name: &str, min: u64, max: u64| {
        let val = lookup(name)?;
        let parsed = parse_u64_range(&val, min, max);
        if parsed.is_none() {
            warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        parsed
    };

    if let Some(v) = string("CONCLAVE_WORKSPACE_ROOT") {
        settings.workspace.root = v;
    }
    if let Some(v) = ranged("CONCLAVE_LOCK_TIMEOUT_MS", 1, 3_600_000) {
        settings.workspace.lock_timeout_ms = v;
    }
    if let Some(v) = ranged("CONCLAVE_TALK_BUDGET", 0, 1_000) {
        settings.agent.talk_budget = u32::try_from(v).unwrap_or(settings.agent.talk_budget);
    }
    if let Some(v) = ranged("CONCLAVE_IDLE_THRESHOLD_MS", 100, 3_600_000) {
        settings.session.idle_threshold_ms = v;
    }
    if let Some(v) = ranged("CONCLAVE_SESSION_TIMEOUT_MS", 1_000, 86_400_000) {
        settings.session.timeout_ms = v;
    }
    if let Some(v) = string("CONCLAVE_COMPLETION_URL") {
        settings.completion.base_url = v;
    }
    if let Some(v) = string("CONCLAVE_MODEL") {
        settings.completion.model = v;
    }
    if let Some(v) = string("CONCLAVE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = lookup("CONCLAVE_LOG_JSON") {
        match parse_bool(&v) {
            Some(b) => settings.logging.json = b,
            None => warn!(key = "CONCLAVE_LOG_JSON", value = %v, "invalid boolean env var, ignoring"),
        }
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
