//! Scenario: the YAML files shipped in `config/` load, pass the secret guard,
//! and produce valid typed settings, alone and with the production overlay.

use std::io::Write;

use gcare_config::load_layered_yaml;

fn repo_path(rel: &str) -> String {
    format!("{}/../../{}", env!("CARGO_MANIFEST_DIR"), rel)
}

#[test]
fn base_config_loads_with_sandbox_gateway() {
    let base = repo_path("config/base.yaml");
    let cfg = load_layered_yaml(&[&base]).unwrap();
    let s = cfg.settings().unwrap();
    assert!(s.gateway.pay_url.contains("sandbox"));
    assert_eq!(s.gateway.version, "2.1.0");
    assert_eq!(s.gateway.currency, "VND");
    assert_eq!(s.gateway.timezone, "Asia/Ho_Chi_Minh");
}

#[test]
fn production_overlay_replaces_urls_and_key_names() {
    let base = repo_path("config/base.yaml");
    let prod = repo_path("config/environments/production.yaml");
    let base_only = load_layered_yaml(&[&base]).unwrap();
    let cfg = load_layered_yaml(&[&base, &prod]).unwrap();
    assert_ne!(base_only.config_hash, cfg.config_hash);

    let s = cfg.settings().unwrap();
    assert!(!s.gateway.pay_url.contains("sandbox"));
    assert_eq!(s.server.cors_origins.len(), 1, "arrays replace, they do not append");
    assert_eq!(s.gateway.expire_minutes, 15, "inherited from base");
    assert_eq!(
        cfg.config_json
            .pointer("/gateway/keys_env/hash_secret")
            .and_then(|v| v.as_str()),
        Some("VNP_HASH_SECRET_PROD")
    );
}

#[test]
fn local_overlay_file_from_disk() {
    let mut overlay = tempfile::NamedTempFile::new().unwrap();
    writeln!(overlay, "server:\n  bind_addr: \"127.0.0.1:9999\"").unwrap();

    let base = repo_path("config/base.yaml");
    let overlay_path = overlay.path().to_string_lossy().to_string();
    let cfg = load_layered_yaml(&[&base, &overlay_path]).unwrap();
    assert_eq!(cfg.settings().unwrap().server.bind_addr, "127.0.0.1:9999");
}

#[test]
fn unknown_gateway_timezone_is_rejected() {
    let mut overlay = tempfile::NamedTempFile::new().unwrap();
    writeln!(overlay, "gateway:\n  timezone: \"Asia/Atlantis\"").unwrap();

    let base = repo_path("config/base.yaml");
    let overlay_path = overlay.path().to_string_lossy().to_string();
    let cfg = load_layered_yaml(&[&base, &overlay_path]).unwrap();
    let err = cfg.settings().unwrap_err().to_string();
    assert!(err.contains("CONFIG_INVALID"), "{err}");
    assert!(err.contains("/gateway/timezone"), "{err}");
}

#[test]
fn missing_file_names_the_path() {
    let err = load_layered_yaml(&["/nonexistent/gencare/config.yaml"])
        .unwrap_err()
        .to_string();
    assert!(err.contains("/nonexistent/gencare/config.yaml"), "{err}");
}
