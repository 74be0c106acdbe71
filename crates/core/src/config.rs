use std::collections::BTreeMap;
use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    /// Xen Orchestra instances keyed by datacenter name.
    pub xen: BTreeMap<String, XenConfig>,
    pub netbox: NetBoxConfig,
    pub salt: SaltConfig,
    /// Per-request timeout shared by every HTTP client.
    pub http_timeout_secs: u64,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `INVSYNC_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("INVSYNC_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            xen: xen_datacenters(p),
            netbox: NetBoxConfig::from_env_profiled(p),
            salt: SaltConfig::from_env_profiled(p),
            http_timeout_secs: profiled_env_u64(p, "HTTP_TIMEOUT_SECS", 20),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        for (name, xen) in &self.xen {
            tracing::info!("  xen:     [{}] url={}, token={}", name, xen.base_url, present(&xen.api_token));
        }
        tracing::info!("  netbox:  url={}, token={}", self.netbox.base_url, present(&self.netbox.api_token));
        tracing::info!("  salt:    url={}, target_version={}", self.salt.api_url, self.salt.target_version);
        tracing::info!("  http:    timeout={}s", self.http_timeout_secs);
    }

    /// Return a redacted view safe for printing (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "xen": self.xen.iter().map(|(name, xen)| {
                (name.clone(), serde_json::json!({
                    "base_url": xen.base_url,
                    "verify_ssl": xen.verify_ssl,
                    "configured": xen.is_configured(),
                }))
            }).collect::<serde_json::Map<_, _>>(),
            "netbox": {
                "base_url": self.netbox.base_url,
                "verify_ssl": self.netbox.verify_ssl,
                "configured": self.netbox.is_configured(),
            },
            "salt": {
                "api_url": self.salt.api_url,
                "eauth": self.salt.eauth,
                "verify_ssl": self.salt.verify_ssl,
                "target_version": self.salt.target_version,
                "configured": self.salt.is_configured(),
            },
            "http_timeout_secs": self.http_timeout_secs,
        })
    }
}

fn present(secret: &Option<String>) -> &'static str {
    if secret.is_some() { "set" } else { "(none)" }
}

// ── Xen Orchestra ─────────────────────────────────────────────

/// Datacenter name used when `XEN_DATACENTERS` is not set.
pub const DEFAULT_DATACENTER: &str = "default";

/// `XEN_DATACENTERS=hfm,ams` reads `XEN_HFM_BASE_URL`, `XEN_AMS_API_TOKEN`, ...
/// Without it a single datacenter is read from the plain `XEN_*` keys.
fn xen_datacenters(p: &str) -> BTreeMap<String, XenConfig> {
    match profiled_env_opt(p, "XEN_DATACENTERS") {
        Some(names) => names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| (name.to_lowercase(), XenConfig::from_env_profiled(p, Some(name))))
            .collect(),
        None => BTreeMap::from([(DEFAULT_DATACENTER.to_string(), XenConfig::from_env_profiled(p, None))]),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XenConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub verify_ssl: bool,
}

impl XenConfig {
    fn from_env_profiled(p: &str, datacenter: Option<&str>) -> Self {
        let key = |name: &str| match datacenter {
            Some(dc) => format!("XEN_{}_{name}", dc.to_uppercase().replace('-', "_")),
            None => format!("XEN_{name}"),
        };
        Self {
            base_url: profiled_env_or(p, &key("BASE_URL"), "https://localhost"),
            api_token: profiled_env_opt(p, &key("API_TOKEN")),
            verify_ssl: profiled_env_bool(p, &key("VERIFY_SSL"), true),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_token.is_some()
    }
}

// ── NetBox ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetBoxConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub verify_ssl: bool,
}

impl NetBoxConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_url: profiled_env_or(p, "NETBOX_BASE_URL", "http://localhost:8000"),
            api_token: profiled_env_opt(p, "NETBOX_API_TOKEN"),
            verify_ssl: profiled_env_bool(p, "NETBOX_VERIFY_SSL", true),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_token.is_some()
    }
}

// ── Salt API ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaltConfig {
    pub api_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// External auth backend passed on login.
    pub eauth: String,
    pub verify_ssl: bool,
    /// Baseline `major.minor` release minions are compared against.
    pub target_version: String,
}

impl SaltConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            api_url: profiled_env_or(p, "SALT_API_URL", "http://localhost:8000"),
            username: profiled_env_opt(p, "SALT_USERNAME"),
            password: profiled_env_opt(p, "SALT_PASSWORD"),
            eauth: profiled_env_or(p, "SALT_EAUTH", "pam"),
            verify_ssl: profiled_env_bool(p, "SALT_VERIFY_SSL", false),
            target_version: profiled_env_or(p, "SALT_TARGET_VERSION", "3006.9"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiled_key_wins_over_plain_key() {
        // Unique key names keep this test independent of the others running in parallel.
        env::set_var("INVSYNC_TEST_PLAIN_KEY", "plain");
        env::set_var("QA_INVSYNC_TEST_PLAIN_KEY", "profiled");
        assert_eq!(profiled_env_opt("QA", "INVSYNC_TEST_PLAIN_KEY").as_deref(), Some("profiled"));
        assert_eq!(profiled_env_opt("", "INVSYNC_TEST_PLAIN_KEY").as_deref(), Some("plain"));
        assert_eq!(profiled_env_opt("OTHER", "INVSYNC_TEST_PLAIN_KEY").as_deref(), Some("plain"));
    }

    #[test]
    fn empty_values_count_as_missing() {
        env::set_var("INVSYNC_TEST_EMPTY_KEY", "");
        assert_eq!(profiled_env_opt("", "INVSYNC_TEST_EMPTY_KEY"), None);
        assert_eq!(profiled_env_or("", "INVSYNC_TEST_EMPTY_KEY", "fallback"), "fallback");
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        env::set_var("INVSYNC_TEST_BOOL_FALSE", "false");
        env::set_var("INVSYNC_TEST_BOOL_YES", "Yes");
        assert!(!profiled_env_bool("", "INVSYNC_TEST_BOOL_FALSE", true));
        assert!(profiled_env_bool("", "INVSYNC_TEST_BOOL_YES", false));
        assert!(profiled_env_bool("", "INVSYNC_TEST_BOOL_MISSING", true));
    }

    #[test]
    fn xen_datacenters_are_read_per_name() {
        env::set_var("DCTEST_XEN_DATACENTERS", "hfm, ams-2");
        env::set_var("DCTEST_XEN_HFM_BASE_URL", "https://xo.hfm.example");
        env::set_var("DCTEST_XEN_AMS_2_API_TOKEN", "ams-token");
        env::set_var("DCTEST_XEN_AMS_2_VERIFY_SSL", "false");

        let config = Config::for_profile("dctest");
        let names: Vec<&str> = config.xen.keys().map(String::as_str).collect();
        assert_eq!(names, ["ams-2", "hfm"]);
        assert_eq!(config.xen["hfm"].base_url, "https://xo.hfm.example");
        assert_eq!(config.xen["ams-2"].api_token.as_deref(), Some("ams-token"));
        assert!(!config.xen["ams-2"].verify_ssl);
        assert!(config.xen["hfm"].verify_ssl);
    }

    #[test]
    fn single_datacenter_without_list() {
        let config = Config::for_profile("INVSYNC_TEST_SINGLE_DC");
        assert_eq!(config.xen.keys().collect::<Vec<_>>(), [DEFAULT_DATACENTER]);
    }

    #[test]
    fn salt_tls_verification_is_configurable() {
        env::set_var("SALTTLS_SALT_VERIFY_SSL", "true");
        assert!(Config::for_profile("salttls").salt.verify_ssl);
        assert!(!Config::for_profile("INVSYNC_TEST_SALT_DEFAULT").salt.verify_ssl);
    }

    #[test]
    fn redacted_summary_hides_secrets() {
        let mut config = Config::for_profile("INVSYNC_TEST_REDACT");
        config.netbox.api_token = Some("super-secret".into());
        config.salt.password = Some("hunter2".into());
        let rendered = config.redacted_summary().to_string();
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("hunter2"));
        assert_eq!(config.redacted_summary()["netbox"]["configured"], true);
        assert_eq!(config.profile_label(), "INVSYNC_TEST_REDACT");
    }
}
