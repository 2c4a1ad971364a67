use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::providers::http::HttpPolicy;
use crate::providers::tracker::DEFAULT_TRACKER_API_URL;

/// Configuration file structure for the bot.
///
/// Every value can also be given on the command line, which takes precedence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub concourse: ConcourseConfig,

    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub http: HttpConfig,

    /// Incident groups, checked in file order: `label = ["pattern", ...]`
    #[serde(default)]
    pub grouping: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConcourseConfig {
    /// Concourse base URL (e.g., 'https://ci.example.com')
    pub host: Option<String>,

    /// Concourse team whose pipelines are watched
    #[serde(default = "default_team")]
    pub team: String,

    /// Bearer token for teams that are not publicly readable
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TrackerConfig {
    #[serde(default = "default_tracker_api_url")]
    pub api_url: String,

    pub token: Option<String>,

    pub project_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScheduleConfig {
    /// Seconds to sleep between passes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Stop after this many passes
    pub max_passes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for ConcourseConfig {
    fn default() -> Self {
        Self {
            host: None,
            team: default_team(),
            token: None,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_url: default_tracker_api_url(),
            token: None,
            project_id: None,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_passes: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl HttpConfig {
    pub fn policy(&self) -> HttpPolicy {
        HttpPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}

fn default_team() -> String {
    "main".to_string()
}

fn default_tracker_api_url() -> String {
    DEFAULT_TRACKER_API_URL.to_string()
}

fn default_interval_secs() -> u64 {
    300
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}

const CANDIDATES: [&str; 4] = [
    "tracker-bot.toml",
    "tracker-bot.json",
    "tracker-bot.yaml",
    "tracker-bot.yml",
];

/// `{config_dir}/tracker-bot/config.toml`, e.g. `~/.config/tracker-bot/config.toml` on Linux.
fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tracker-bot").join("config.toml"))
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./tracker-bot.toml
    /// 3. ./tracker-bot.json
    /// 4. ./tracker-bot.yaml
    /// 5. ./tracker-bot.yml
    /// 6. tracker-bot/config.toml in the user's config directory
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let user_file = user_config_file();
        let candidates = CANDIDATES
            .iter()
            .map(PathBuf::from)
            .chain(user_file);

        for candidate in candidates {
            if candidate.exists() {
                return Self::load_from_path(&candidate);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.concourse.team, "main");
        assert_eq!(
            config.tracker.api_url,
            "https://www.pivotaltracker.com/services/v5"
        );
        assert_eq!(config.schedule.interval_secs, 300);
        assert_eq!(config.schedule.max_passes, None);
        assert_eq!(config.http.max_retries, 3);
        assert!(config.grouping.is_empty());
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[concourse]
host = "https://ci.example.com"
team = "husbandandwife"

[tracker]
token = "tracker-token"
project-id = 12345

[schedule]
interval-secs = 60

[grouping]
zeta = ["zeta-.*"]
groupa = [".*-groupa", "groupa-.*"]
alpha = ["alpha-.*"]
"#;
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.concourse.host.as_deref(), Some("https://ci.example.com"));
        assert_eq!(config.concourse.team, "husbandandwife");
        assert_eq!(config.tracker.token.as_deref(), Some("tracker-token"));
        assert_eq!(config.tracker.project_id, Some(12345));
        assert_eq!(config.schedule.interval_secs, 60);
        assert_eq!(config.http.timeout_secs, 30);

        let labels: Vec<&str> = config.grouping.keys().map(String::as_str).collect();
        assert_eq!(labels, vec!["zeta", "groupa", "alpha"]);
        assert_eq!(config.grouping["groupa"], vec![".*-groupa", "groupa-.*"]);
    }

    #[test]
    fn test_load_yaml_config_keeps_group_order() {
        let mut temp_file = NamedTempFile::with_suffix(".yml").unwrap();
        let yaml_content = r#"
tracker:
  project-id: 7
grouping:
  second: ["b-.*"]
  first: ["a-.*"]
"#;
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.tracker.project_id, Some(7));
        let labels: Vec<&str> = config.grouping.keys().map(String::as_str).collect();
        assert_eq!(labels, vec!["second", "first"]);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "concourse": { "host": "https://ci.json.com" },
  "http": { "max-retries": 0, "retry-delay-secs": 1 }
}"#;
        write!(temp_file, "{}", json_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.concourse.host.as_deref(), Some("https://ci.json.com"));
        assert_eq!(config.concourse.team, "main");

        let policy = config.http.policy();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.retry_delay, Duration::from_secs(1));
        assert_eq!(policy.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_load_unknown_extension_falls_back() {
        let mut temp_file = NamedTempFile::with_suffix(".conf").unwrap();
        write!(temp_file, "[tracker]\nproject-id = 99\n").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.tracker.project_id, Some(99));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let result = Config::load(Some(Path::new("does-not-exist.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_config_reports_path() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "[tracker\nproject-id = ").unwrap();

        let err = Config::load_from_path(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML config"));
    }
}
