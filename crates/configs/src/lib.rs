use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, Context};
use anyhow::Result;
use serde::Deserialize;

pub const CONTENT_HOST_ENV: &str = "SAFERICE_CONTENT_HOST";
pub const INFERENCE_HOST_ENV: &str = "SAFERICE_INFERENCE_HOST";

const DEFAULT_BASE_HOST: &str = "http://192.168.18.8";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub registries: RegistriesConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistriesConfig {
    #[serde(default = "RegistryConfig::content_defaults")]
    pub content: RegistryConfig,
    #[serde(default = "RegistryConfig::inference_defaults")]
    pub inference: RegistryConfig,
}

impl Default for RegistriesConfig {
    fn default() -> Self {
        Self {
            content: RegistryConfig::content_defaults(),
            inference: RegistryConfig::inference_defaults(),
        }
    }
}

/// One backend family: a shared host plus a `service -> port` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RegistryConfig {
    #[serde(default)]
    pub base_host: String,
    #[serde(default)]
    pub ports: BTreeMap<String, String>,
}

impl RegistryConfig {
    /// Account/content backend plus the services the app screens reach through it.
    pub fn content_defaults() -> Self {
        Self::with_ports(&[
            ("database", "5001"),
            ("health", "5000"),
            ("disease", "5002"),
            ("rice_classification", "5003"),
            ("nutrition_extract_single_grain", "5004"),
            ("nutrition_extract_multi_grain", "5005"),
        ])
    }

    /// ML model backends.
    pub fn inference_defaults() -> Self {
        Self::with_ports(&[
            ("health", "5000"),
            ("disease", "5002"),
            ("outline_Multi_Grain", "5001"),
            ("outline_Single_Grain", "5004"),
            ("rice_classification", "5003"),
        ])
    }

    fn with_ports(ports: &[(&str, &str)]) -> Self {
        Self {
            base_host: DEFAULT_BASE_HOST.to_string(),
            ports: ports
                .iter()
                .map(|(name, port)| (name.to_string(), port.to_string()))
                .collect(),
        }
    }

    fn normalize(&mut self, label: &str, host_env: &str) -> Result<()> {
        // TOML 中未提供 base_host 时，从环境变量填充
        if self.base_host.trim().is_empty() {
            if let Ok(host) = std::env::var(host_env) {
                self.base_host = host;
            }
        }
        let host = self.base_host.trim().trim_end_matches('/').to_string();
        if host.is_empty() {
            return Err(anyhow!(
                "registries.{label}.base_host is empty; set it in config.toml or {host_env}"
            ));
        }
        let lower = host.to_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(anyhow!(
                "registries.{label}.base_host must start with http:// or https://"
            ));
        }
        self.base_host = host;

        if self.ports.is_empty() {
            return Err(anyhow!("registries.{label}.ports must list at least one service"));
        }
        for (service, port) in self.ports.iter_mut() {
            let trimmed = port.trim();
            match trimmed.parse::<u16>() {
                Ok(p) if p > 0 => *port = trimmed.to_string(),
                _ => {
                    return Err(anyhow!(
                        "registries.{label}.ports.{service} must be in 1..=65535, got {port:?}"
                    ))
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl DispatchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(anyhow!("dispatch timeouts must be positive seconds"));
        }
        if self.connect_timeout_secs > self.request_timeout_secs {
            return Err(anyhow!(
                "dispatch.connect_timeout_secs must not exceed request_timeout_secs"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_path")]
    pub path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { path: default_session_path() }
    }
}

/// What a screen does when the user submits again while a request is in flight.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubmitPolicy {
    /// Refuse the second submission.
    #[default]
    Reject,
    /// Cancel the in-flight request and start the new one.
    Replace,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SubmissionConfig {
    #[serde(default)]
    pub policy: SubmitPolicy,
}

fn default_request_timeout() -> u64 { 30 }
fn default_connect_timeout() -> u64 { 5 }
fn default_session_path() -> String { "data/session.json".to_string() }

/// `$CONFIG_PATH`, or `config.toml` in the working directory.
pub fn default_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string())
}

/// `Ok(None)` when there is no file at `path`; unreadable or malformed files are errors.
pub fn load_optional(path: &str) -> Result<Option<AppConfig>> {
    match std::fs::read_to_string(path) {
        Ok(content) => load_from_str(&content)
            .map(Some)
            .with_context(|| format!("invalid config file {path}")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(anyhow!("cannot read config file {path}: {e}")),
    }
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Config at [`default_path`]; built-in defaults only when that file is absent.
    pub fn load_and_validate() -> Result<Self> {
        Self::load_and_validate_from(&default_path())
    }

    pub fn load_and_validate_from(path: &str) -> Result<Self> {
        let mut cfg = load_optional(path)?.unwrap_or_default();
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.registries.content.normalize("content", CONTENT_HOST_ENV)?;
        self.registries.inference.normalize("inference", INFERENCE_HOST_ENV)?;
        self.dispatch.validate()?;
        if self.session.path.trim().is_empty() {
            self.session.path = default_session_path();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployed_port_tables() {
        let cfg = AppConfig::default();
        let content = &cfg.registries.content;
        assert_eq!(content.base_host, "http://192.168.18.8");
        assert_eq!(content.ports["database"], "5001");
        assert_eq!(content.ports["nutrition_extract_multi_grain"], "5005");
        assert!(!content.ports.contains_key("outline_Multi_Grain"));

        let inference = &cfg.registries.inference;
        assert_eq!(inference.ports["outline_Multi_Grain"], "5001");
        assert_eq!(inference.ports["disease"], "5002");
        assert_eq!(cfg.dispatch.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.submission.policy, SubmitPolicy::Reject);
        assert_eq!(cfg.session.path, "data/session.json");
    }

    #[test]
    fn parses_toml_and_normalizes_host() -> Result<()> {
        let mut cfg = load_from_str(
            r#"
            [registries.content]
            base_host = "https://api.example.test/"
            ports = { database = " 8001 " }

            [dispatch]
            request_timeout_secs = 3
            connect_timeout_secs = 1

            [submission]
            policy = "replace"
            "#,
        )?;
        cfg.normalize_and_validate()?;
        assert_eq!(cfg.registries.content.base_host, "https://api.example.test");
        assert_eq!(cfg.registries.content.ports["database"], "8001");
        // 未配置的 registry 使用默认值
        assert_eq!(cfg.registries.inference, RegistryConfig::inference_defaults());
        assert_eq!(cfg.dispatch.request_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.submission.policy, SubmitPolicy::Replace);
        Ok(())
    }

    #[test]
    fn rejects_bad_port() {
        let mut cfg = AppConfig::default();
        cfg.registries.inference.ports.insert("disease".into(), "70000".into());
        let err = cfg.normalize_and_validate().unwrap_err().to_string();
        assert!(err.contains("registries.inference.ports.disease"), "{err}");
    }

    #[test]
    fn rejects_host_without_scheme() {
        let mut cfg = AppConfig::default();
        cfg.registries.content.base_host = "192.168.18.8".into();
        assert!(cfg.normalize_and_validate().is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut cfg = AppConfig::default();
        cfg.dispatch.request_timeout_secs = 0;
        assert!(cfg.normalize_and_validate().is_err());
    }

    #[test]
    fn rejects_unknown_policy() {
        let parsed = load_from_str("[submission]\npolicy = \"debounce\"\n");
        assert!(parsed.is_err());
    }

    fn temp_config(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("saferice_cfg_{}_{}.toml", std::process::id(), name))
    }

    #[test]
    fn missing_file_falls_back_to_defaults() -> Result<()> {
        let path = temp_config("missing");
        let _ = std::fs::remove_file(&path);
        assert!(load_optional(&path.to_string_lossy())?.is_none());

        let cfg = AppConfig::load_and_validate_from(&path.to_string_lossy())?;
        assert_eq!(cfg.registries.content.base_host, "http://192.168.18.8");
        Ok(())
    }

    #[test]
    fn malformed_file_is_an_error_not_defaults() -> Result<()> {
        let path = temp_config("malformed");
        std::fs::write(&path, "[registries.content\nbase_host = \"http://10.0.0.5\"\n")?;

        let err = AppConfig::load_and_validate_from(&path.to_string_lossy()).unwrap_err();
        assert!(format!("{err:#}").contains("invalid config file"), "{err:#}");
        assert!(load_optional(&path.to_string_lossy()).is_err());

        let _ = std::fs::remove_file(&path);
        Ok(())
    }

    #[test]
    fn existing_file_is_loaded_and_normalized() -> Result<()> {
        let path = temp_config("valid");
        std::fs::write(
            &path,
            "[registries.content]\nbase_host = \"http://10.0.0.5/\"\nports = { database = \"8001\" }\n",
        )?;

        let cfg = AppConfig::load_and_validate_from(&path.to_string_lossy())?;
        assert_eq!(cfg.registries.content.base_host, "http://10.0.0.5");
        assert_eq!(cfg.registries.content.ports["database"], "8001");

        let _ = std::fs::remove_file(&path);
        Ok(())
    }
}
