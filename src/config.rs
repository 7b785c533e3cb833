use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    #[serde(default)]
    pub autosave: AutosaveConfig,
    #[serde(default)]
    pub drafts: DraftsConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub rest_api: RestApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub payslip: PayslipConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root for drafts, submissions, payslips, outbox and logs
    pub data: String,
}

/// Debounced draft autosave
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveConfig {
    #[serde(default = "default_autosave_enabled")]
    pub enabled: bool,
    /// Quiet period after the last change before a draft is saved
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_autosave_enabled() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    800
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: default_autosave_enabled(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftsConfig {
    /// Keep submitted drafts (status `complete`) instead of deleting them
    #[serde(default)]
    pub retain_completed: bool,
    /// Retries for transient failures while loading a draft
    #[serde(default = "default_load_retries")]
    pub load_retries: usize,
    #[serde(default = "default_load_retry_base_ms")]
    pub load_retry_base_ms: u64,
    #[serde(default = "default_load_retry_max_ms")]
    pub load_retry_max_ms: u64,
}

fn default_load_retries() -> usize {
    3
}

fn default_load_retry_base_ms() -> u64 {
    200
}

fn default_load_retry_max_ms() -> u64 {
    5_000
}

impl Default for DraftsConfig {
    fn default() -> Self {
        Self {
            retain_completed: false,
            load_retries: default_load_retries(),
            load_retry_base_ms: default_load_retry_base_ms(),
            load_retry_max_ms: default_load_retry_max_ms(),
        }
    }
}

/// Where drafts and submissions are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// JSON files under the data directory
    #[default]
    File,
    /// Process memory (lost on exit)
    Memory,
    /// Hosted backend-as-a-service over HTTP
    Hosted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    /// Base URL of the hosted backend (required for `hosted`)
    #[serde(default)]
    pub url: Option<String>,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_key_env() -> String {
    "BACKOFFICE_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            url: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestApiConfig {
    #[serde(default = "default_rest_port")]
    pub port: u16,
    #[serde(default = "default_rest_host")]
    pub host: String,
}

fn default_rest_port() -> u16 {
    7010
}

fn default_rest_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for RestApiConfig {
    fn default() -> Self {
        Self {
            port: default_rest_port(),
            host: default_rest_host(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to log to file when serving (false = stderr)
    #[serde(default = "default_log_to_file")]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_to_file() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: default_log_to_file(),
        }
    }
}

/// Payslip delivery defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayslipConfig {
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Handlebars subject used when the wizard leaves it blank
    #[serde(default = "default_subject")]
    pub default_subject: String,
    #[serde(default = "default_body")]
    pub default_body: String,
}

fn default_from_address() -> String {
    "payroll@localhost".to_string()
}

fn default_subject() -> String {
    "Your payslip for {{period}}".to_string()
}

fn default_body() -> String {
    "Dear {{employee.name}},\n\nYour payslip for {{period}} is ready. Net pay: {{net_pay}}.\n"
        .to_string()
}

impl Default for PayslipConfig {
    fn default() -> Self {
        Self {
            from_address: default_from_address(),
            default_subject: default_subject(),
            default_body: default_body(),
        }
    }
}

impl Config {
    /// Path to the project config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".backoffice/config.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so the service runs without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let project_config = Self::project_config_path();
        if project_config.exists() {
            builder = builder.add_source(config::File::from(project_config));
        }

        // User config in ~/.config/backoffice/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("backoffice").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables, e.g. BACKOFFICE__REST_API__PORT=8080
        builder = builder.add_source(
            config::Environment::with_prefix("BACKOFFICE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save config to .backoffice/config.toml
    pub fn save(&self) -> Result<()> {
        let config_path = Self::project_config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create backoffice config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(&config_path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    /// Get absolute path to the data directory
    pub fn data_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.paths.data);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    pub fn drafts_path(&self) -> PathBuf {
        self.data_path().join("drafts")
    }

    pub fn submissions_path(&self) -> PathBuf {
        self.data_path().join("submissions")
    }

    pub fn payslips_path(&self) -> PathBuf {
        self.data_path().join("payslips")
    }

    pub fn outbox_path(&self) -> PathBuf {
        self.data_path().join("outbox")
    }

    pub fn logs_path(&self) -> PathBuf {
        self.data_path().join("logs")
    }

    /// Autosave quiet period, or `None` when autosave is disabled
    pub fn autosave_debounce(&self) -> Option<std::time::Duration> {
        self.autosave
            .enabled
            .then(|| std::time::Duration::from_millis(self.autosave.debounce_ms))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                data: ".backoffice".to_string(), // Relative to cwd
            },
            autosave: AutosaveConfig::default(),
            drafts: DraftsConfig::default(),
            backend: BackendConfig::default(),
            rest_api: RestApiConfig::default(),
            logging: LoggingConfig::default(),
            payslip: PayslipConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_paths_hang_off_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.data = temp_dir.path().to_string_lossy().to_string();

        assert_eq!(config.drafts_path(), temp_dir.path().join("drafts"));
        assert_eq!(config.outbox_path(), temp_dir.path().join("outbox"));
        assert!(config.logs_path().starts_with(temp_dir.path()));
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[autosave]\ndebounce_ms = 50\n\n[backend]\nkind = \"memory\"\n\n[drafts]\nretain_completed = true\n",
        )
        .unwrap();

        let config = Config::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.autosave.debounce_ms, 50);
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert!(config.drafts.retain_completed);
        assert_eq!(config.rest_api.port, 7010);
    }

    #[test]
    fn test_autosave_debounce_disabled() {
        let mut config = Config::default();
        assert_eq!(
            config.autosave_debounce(),
            Some(std::time::Duration::from_millis(800))
        );
        config.autosave.enabled = false;
        assert_eq!(config.autosave_debounce(), None);
    }

    #[test]
    fn test_config_serializes_to_toml() {
        let toml_str = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(toml_str.contains("[rest_api]"));
        assert!(toml_str.contains("kind = \"file\""));
    }
}
