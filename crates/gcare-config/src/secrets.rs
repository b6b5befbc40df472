//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES under `/gateway/keys_env/*`. Binaries
//! call [`resolve_gateway_secrets`] once at startup and hand the result to the
//! gateway adapter; nothing else reads these variables.
//!
//! Error messages name the variable, never its value, and `Debug` output of
//! [`GatewaySecrets`] redacts the signing key.

use anyhow::{bail, Result};
use serde_json::Value;

pub const DEFAULT_TMN_CODE_ENV: &str = "VNP_TMN_CODE";
pub const DEFAULT_HASH_SECRET_ENV: &str = "VNP_HASH_SECRET";

/// Merchant credentials for the payment gateway.
#[derive(Clone)]
pub struct GatewaySecrets {
    /// Terminal (merchant) code. Sent in every payment URL, so not secret,
    /// but provisioned alongside the key.
    pub tmn_code: String,
    /// Shared HMAC key.
    pub hash_secret: String,
}

impl std::fmt::Debug for GatewaySecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySecrets")
            .field("tmn_code", &self.tmn_code)
            .field("hash_secret", &"<REDACTED>")
            .finish()
    }
}

/// Env var names extracted from the config JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySecretEnvNames {
    pub tmn_code_var: String,
    pub hash_secret_var: String,
}

impl GatewaySecretEnvNames {
    /// Falls back to the well-known names when a pointer is absent.
    pub fn from_config_json(config_json: &Value) -> Self {
        Self {
            tmn_code_var: read_str_at(config_json, "/gateway/keys_env/tmn_code")
                .unwrap_or_else(|| DEFAULT_TMN_CODE_ENV.to_string()),
            hash_secret_var: read_str_at(config_json, "/gateway/keys_env/hash_secret")
                .unwrap_or_else(|| DEFAULT_HASH_SECRET_ENV.to_string()),
        }
    }
}

fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// `None` when the variable is unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Resolve the merchant code and hashing key. Both are required: a service
/// that cannot sign cannot build payment URLs or verify callbacks.
pub fn resolve_gateway_secrets(config_json: &Value) -> Result<GatewaySecrets> {
    let names = GatewaySecretEnvNames::from_config_json(config_json);

    let Some(tmn_code) = resolve_env(&names.tmn_code_var) else {
        bail!(
            "SECRETS_MISSING: required env var '{}' (gateway tmn_code) is not set or empty",
            names.tmn_code_var
        );
    };
    let Some(hash_secret) = resolve_env(&names.hash_secret_var) else {
        bail!(
            "SECRETS_MISSING: required env var '{}' (gateway hash_secret) is not set or empty",
            names.hash_secret_var
        );
    };

    Ok(GatewaySecrets {
        tmn_code,
        hash_secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn env_names_default_when_absent() {
        let names = GatewaySecretEnvNames::from_config_json(&json!({}));
        assert_eq!(names.tmn_code_var, DEFAULT_TMN_CODE_ENV);
        assert_eq!(names.hash_secret_var, DEFAULT_HASH_SECRET_ENV);
    }

    #[test]
    fn debug_redacts_hash_secret() {
        let s = GatewaySecrets {
            tmn_code: "GENCARE1".to_string(),
            hash_secret: "SUPERSECRETKEYVALUE".to_string(),
        };
        let dbg = format!("{s:?}");
        assert!(dbg.contains("GENCARE1"));
        assert!(dbg.contains("<REDACTED>"));
        assert!(!dbg.contains("SUPERSECRETKEYVALUE"));
    }
}
