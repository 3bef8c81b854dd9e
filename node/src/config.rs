use anyhow::{bail, Context, Result};
use config::{Config, Environment, File as ConfigFile};
use drive_registry::RegistryConfig;
use drive_types::DEFAULT_MAX_CONTENT_REF_LEN;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/drive.toml";
pub const ENV_PREFIX: &str = "DRIVE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub node_id: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub db_path: String,
    /// Keep registry state in process memory only.
    pub memory: bool,
    pub max_entries_per_owner: Option<u64>,
    pub max_content_ref_len: usize,
    pub max_clock_skew_secs: u64,
    pub log_level: String,
    pub log_format: String,
    pub prometheus_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: "drive-node".to_string(),
            rpc_host: "127.0.0.1".to_string(),
            rpc_port: 8645,
            db_path: "./data/drive/db".to_string(),
            memory: false,
            max_entries_per_owner: None,
            max_content_ref_len: DEFAULT_MAX_CONTENT_REF_LEN,
            max_clock_skew_secs: 300,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            prometheus_enabled: true,
        }
    }
}

impl AppConfig {
    /// Load from the config file (explicit, or `config/drive.toml` if present)
    /// layered under `DRIVE_*` environment variables.
    pub fn load(config_path_override: Option<&str>) -> Result<Self> {
        let resolved_path = if let Some(path) = config_path_override {
            let path = PathBuf::from(path);
            if !path.exists() {
                bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            Some(path)
        } else {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            path.exists().then_some(path)
        };

        Self::load_from(resolved_path.as_deref(), Environment::with_prefix(ENV_PREFIX))
    }

    pub fn load_from(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(ConfigFile::from(path));
        }
        let config = builder
            .add_source(env)
            .build()
            .context("failed to read configuration")?;
        Self::from_config(&config)
    }

    fn from_config(config: &Config) -> Result<Self> {
        let defaults = Self::default();

        let rpc_port = match get_u64_value(config, &["rpc_port", "rpc.port"])? {
            Some(port) => u16::try_from(port).with_context(|| format!("rpc port {port} out of range"))?,
            None => defaults.rpc_port,
        };
        let max_content_ref_len =
            match get_u64_value(config, &["max_content_ref_len", "registry.max_content_ref_len"])? {
                Some(len) => usize::try_from(len).context("max_content_ref_len out of range")?,
                None => defaults.max_content_ref_len,
            };

        Ok(Self {
            node_id: get_string_value(config, &["node_id", "node.id"]).unwrap_or(defaults.node_id),
            rpc_host: get_string_value(config, &["rpc_host", "rpc.host"])
                .unwrap_or(defaults.rpc_host),
            rpc_port,
            db_path: get_string_value(config, &["db_path", "storage.db_path"])
                .unwrap_or(defaults.db_path),
            memory: get_bool_value(config, &["memory", "storage.memory"], defaults.memory),
            max_entries_per_owner: get_u64_value(
                config,
                &["max_entries_per_owner", "registry.max_entries_per_owner"],
            )?,
            max_content_ref_len,
            max_clock_skew_secs: get_u64_value(
                config,
                &["max_clock_skew_secs", "auth.max_clock_skew_secs"],
            )?
            .unwrap_or(defaults.max_clock_skew_secs),
            log_level: get_string_value(config, &["log_level", "log.level"])
                .unwrap_or(defaults.log_level),
            log_format: get_string_value(config, &["log_format", "log.format"])
                .unwrap_or(defaults.log_format),
            prometheus_enabled: get_bool_value(
                config,
                &["prometheus_enabled", "metrics.prometheus_enabled"],
                defaults.prometheus_enabled,
            ),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_content_ref_len == 0 {
            bail!("registry.max_content_ref_len must be greater than zero");
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            bail!("log.format must be `pretty` or `json`, got `{}`", self.log_format);
        }
        if !self.memory && self.db_path.trim().is_empty() {
            bail!("storage.db_path must be set unless running with --memory");
        }
        Ok(())
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            max_entries_per_owner: self.max_entries_per_owner,
            max_content_ref_len: self.max_content_ref_len,
        }
    }

    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_host, self.rpc_port)
    }
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn get_bool_value(config: &Config, keys: &[&str], default: bool) -> bool {
    for key in keys {
        if let Ok(value) = config.get_bool(key) {
            return value;
        }
        if let Ok(raw) = config.get_string(key) {
            if let Ok(parsed) = raw.parse::<bool>() {
                return parsed;
            }
        }
    }
    default
}

/// Unlike the string and bool lookups, a present but unparsable number is an
/// error rather than a silent fallback.
fn get_u64_value(config: &Config, keys: &[&str]) -> Result<Option<u64>> {
    for key in keys {
        if let Some(raw) = get_string_value(config, &[*key]) {
            let value = raw
                .parse::<u64>()
                .with_context(|| format!("configuration value `{key}` is not a number: {raw}"))?;
            return Ok(Some(value));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn defaults_without_sources() {
        let config = AppConfig::load_from(None, env(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.rpc_addr(), "127.0.0.1:8645");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_values_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drive.toml");
        std::fs::write(
            &path,
            r#"
[node]
id = "gallery-1"

[rpc]
host = "0.0.0.0"
port = 9000

[registry]
max_entries_per_owner = 500

[log]
format = "json"

[metrics]
prometheus_enabled = false
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(Some(&path), env(&[])).unwrap();
        assert_eq!(config.node_id, "gallery-1");
        assert_eq!(config.rpc_addr(), "0.0.0.0:9000");
        assert_eq!(config.max_entries_per_owner, Some(500));
        assert_eq!(config.log_format, "json");
        assert!(!config.prometheus_enabled);
        assert_eq!(config.registry_config().max_entries_per_owner, Some(500));
    }

    #[test]
    fn environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drive.toml");
        std::fs::write(&path, "[rpc]\nport = 9000\n").unwrap();

        let config = AppConfig::load_from(
            Some(&path),
            env(&[
                ("DRIVE_RPC_PORT", "9100"),
                ("DRIVE_MAX_CLOCK_SKEW_SECS", "30"),
                ("DRIVE_DB_PATH", "/var/lib/drive"),
            ]),
        )
        .unwrap();
        assert_eq!(config.rpc_port, 9100);
        assert_eq!(config.max_clock_skew_secs, 30);
        assert_eq!(config.db_path, "/var/lib/drive");
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(AppConfig::load_from(None, env(&[("DRIVE_RPC_PORT", "eighty")])).is_err());
        assert!(AppConfig::load_from(None, env(&[("DRIVE_RPC_PORT", "70000")])).is_err());
    }

    #[test]
    fn validation() {
        let config = AppConfig {
            log_format: "xml".into(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            max_content_ref_len: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(AppConfig::load(Some("/definitely/not/here.toml")).is_err());
    }
}
