//! gcare-config
//!
//! Layered YAML configuration for the GenCare services.
//!
//! Documents are merged in order (later documents override earlier ones),
//! converted to JSON, canonicalised with sorted keys and hashed with SHA-256.
//! The config hash is logged at startup so two processes can be compared.
//!
//! YAML never holds credentials: keys that name a secret must end in `_env`
//! and hold the NAME of an environment variable. See [`secrets`] for the
//! runtime side.

pub mod secrets;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;

/// Values that look like pasted credentials regardless of the key they sit
/// under. Any leaf string starting with one of these aborts the load.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",
    "sk_live",
    "sk_test",
    "AKIA",
    "-----BEGIN",
    "ghp_",
    "glpat-",
    "xoxb-",
    "postgres://",
    "postgresql://",
];

/// Key fragments that mark a leaf as credential-bearing. Such a leaf is only
/// accepted when its key ends in `_env` (or it sits under a `keys_env` map).
const SECRET_KEY_FRAGMENTS: &[&str] = &["secret", "password", "token", "api_key"];

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    pub fn settings(&self) -> Result<AppSettings> {
        AppSettings::from_config_json(&self.config_json)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Map::new());
    for (i, raw) in yaml_docs.iter().enumerate() {
        let v_yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml (layer {i})"))?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Recursive object merge. Non-object values in `b` replace whatever `a`
/// held at the same key; `null` in `b` is a value like any other.
pub fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(&sorted(v)).context("canonical json serialize failed")
}

/// Rebuild `v` with every object's keys inserted in sorted order, so the
/// output is identical whether or not `serde_json` preserves insertion order.
fn sorted(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for k in keys {
                out.insert(k.clone(), sorted(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Secret-literal guard
// ---------------------------------------------------------------------------

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaves(v, "", &mut leaves);

    for (ptr, key, val) in leaves {
        let Some(s) = val.as_str() else { continue };
        if looks_like_secret(s) {
            bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
        }
        if names_a_secret(&ptr, &key) && !is_env_var_name(s) {
            bail!(
                "CONFIG_SECRET_DETECTED leaf={} value=REDACTED \
                 (secret-bearing keys must end in _env and name an environment variable)",
                ptr
            );
        }
    }
    Ok(())
}

fn collect_leaves<'a>(v: &'a Value, prefix: &str, out: &mut Vec<(String, String, &'a Value)>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                if vv.is_object() || vv.is_array() {
                    collect_leaves(vv, &next, out);
                } else {
                    out.push((next, k.clone(), vv));
                }
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaves(vv, &next, out);
            }
        }
        // Scalars are reached through their parent.
        _ => {}
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

/// A leaf names a secret when its key mentions one, or it lives under a
/// `keys_env` map. Keys ending in `_env` are then required to hold env names.
fn names_a_secret(pointer: &str, key: &str) -> bool {
    if pointer.contains("/keys_env/") || key.ends_with("_env") {
        return true;
    }
    let k = key.to_ascii_lowercase();
    SECRET_KEY_FRAGMENTS.iter().any(|f| k.contains(f))
}

/// `UPPER_SNAKE` with at least one letter, as environment variables are named
/// across the deployment.
fn is_env_var_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

// ---------------------------------------------------------------------------
// Typed settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// `host:port` the daemon binds to.
    pub bind_addr: String,
    /// Base URL of the web frontend; payment result pages hang off it.
    pub frontend_url: String,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewaySettings {
    pub pay_url: String,
    pub return_url: String,
    pub version: String,
    pub locale: String,
    pub currency: String,
    pub order_type: String,
    /// Minutes between `vnp_CreateDate` and `vnp_ExpireDate`.
    pub expire_minutes: i64,
    /// IANA zone the gateway's wall-clock timestamps are expressed in.
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    pub server: ServerSettings,
    pub gateway: GatewaySettings,
}

impl AppSettings {
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let settings: AppSettings = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: server/gateway sections do not match the expected shape")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.server.frontend_url.trim().is_empty() {
            bail!("CONFIG_INVALID: /server/frontend_url must not be empty");
        }
        if self.gateway.pay_url.trim().is_empty() || self.gateway.return_url.trim().is_empty() {
            bail!("CONFIG_INVALID: /gateway/pay_url and /gateway/return_url are required");
        }
        if self.gateway.expire_minutes <= 0 {
            bail!(
                "CONFIG_INVALID: /gateway/expire_minutes must be positive (got {})",
                self.gateway.expire_minutes
            );
        }
        if !matches!(self.gateway.locale.as_str(), "vn" | "en") {
            bail!(
                "CONFIG_INVALID: /gateway/locale must be vn or en (got {:?})",
                self.gateway.locale
            );
        }
        if self.gateway.timezone.parse::<chrono_tz::Tz>().is_err() {
            bail!(
                "CONFIG_INVALID: /gateway/timezone must be an IANA zone name (got {:?})",
                self.gateway.timezone
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_overrides_leaves_and_keeps_siblings() {
        let base = json!({"gateway": {"locale": "vn", "version": "2.1.0"}});
        let overlay = json!({"gateway": {"locale": "en"}});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"gateway": {"locale": "en", "version": "2.1.0"}})
        );
    }

    #[test]
    fn env_var_name_shape() {
        assert!(is_env_var_name("VNP_HASH_SECRET"));
        assert!(is_env_var_name("DB2_URL"));
        assert!(!is_env_var_name("vnp_hash_secret"));
        assert!(!is_env_var_name("2FA"));
        assert!(!is_env_var_name(""));
    }

    #[test]
    fn secret_named_keys_must_hold_env_names() {
        assert!(names_a_secret("/gateway/hash_secret", "hash_secret"));
        assert!(names_a_secret("/gateway/keys_env/tmn_code", "tmn_code"));
        assert!(!names_a_secret("/gateway/locale", "locale"));
    }

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let v = json!({"b": {"z": 1, "a": 2}, "a": [ {"y": 1, "x": 2} ]});
        assert_eq!(
            canonicalize_json(&v).unwrap(),
            r#"{"a":[{"x":2,"y":1}],"b":{"a":2,"z":1}}"#
        );
    }
}
