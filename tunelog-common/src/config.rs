//! Configuration loading and root folder resolution

use crate::Result;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::warn;

/// Environment variable naming the Tunelog root folder
pub const ROOT_ENV_VAR: &str = "TUNELOG_ROOT";

/// Default base URL for the external music catalog API
pub const DEFAULT_CATALOG_BASE_URL: &str = "https://musicbrainz.org/ws/2";

/// Default endpoint for the knowledge-graph query service
pub const DEFAULT_KNOWLEDGE_GRAPH_URL: &str = "https://query.wikidata.org/sparql";

/// Contact string used when the config file does not provide one.
/// The catalog API requires a contact-bearing client identifier on
/// every request.
const DEFAULT_CONTACT: &str = "https://github.com/tunelog/tunelog";

/// TOML configuration file contents
///
/// All fields are optional; missing values fall back to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database
    pub root_folder: Option<String>,
    /// Contact email or URL embedded in the catalog API User-Agent
    pub contact: Option<String>,
    /// Override for the catalog API base URL (test hook)
    pub catalog_base_url: Option<String>,
    /// Override for the knowledge-graph query endpoint (test hook)
    pub knowledge_graph_url: Option<String>,
}

impl TomlConfig {
    /// Load configuration from the first config file found, or defaults
    /// if no file exists or the file cannot be parsed.
    pub fn load() -> Self {
        for path in config_file_paths() {
            if !path.exists() {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(content) => match toml::from_str::<TomlConfig>(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        warn!("Ignoring malformed config file {}: {}", path.display(), e);
                        return Self::default();
                    }
                },
                Err(e) => {
                    warn!("Cannot read config file {}: {}", path.display(), e);
                }
            }
        }
        Self::default()
    }

    /// Catalog API base URL, with compiled default
    pub fn catalog_base_url(&self) -> String {
        self.catalog_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_CATALOG_BASE_URL.to_string())
    }

    /// Knowledge-graph query endpoint, with compiled default
    pub fn knowledge_graph_url(&self) -> String {
        self.knowledge_graph_url
            .clone()
            .unwrap_or_else(|| DEFAULT_KNOWLEDGE_GRAPH_URL.to_string())
    }
}

/// Candidate configuration file paths in priority order
fn config_file_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("tunelog").join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        paths.push(PathBuf::from("/etc/tunelog/config.toml"));
    }
    paths
}

/// Resolve the root folder following the priority order:
/// 1. Command-line argument (highest priority)
/// 2. `TUNELOG_ROOT` environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&PathBuf>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.clone();
    }

    if let Ok(path) = std::env::var(ROOT_ENV_VAR) {
        return PathBuf::from(path);
    }

    if let Some(path) = &config.root_folder {
        return PathBuf::from(path);
    }

    default_root_folder()
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("tunelog"))
        .unwrap_or_else(|| PathBuf::from(".tunelog"))
}

/// Create the root folder if it does not exist
pub fn ensure_root_folder(root: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(root)?;
    Ok(())
}

/// Database file path inside the root folder
pub fn database_path(root: &std::path::Path) -> PathBuf {
    root.join("tunelog.db")
}

/// User-Agent string for outgoing catalog API requests.
///
/// Format mandated by the catalog API: `AppName/Version ( contact )`.
pub fn user_agent(contact: Option<&str>) -> String {
    format!(
        "Tunelog/{} ( {} )",
        env!("CARGO_PKG_VERSION"),
        contact.unwrap_or(DEFAULT_CONTACT)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_includes_version_and_contact() {
        let ua = user_agent(Some("ops@example.com"));
        assert!(ua.starts_with("Tunelog/"));
        assert!(ua.contains(env!("CARGO_PKG_VERSION")));
        assert!(ua.contains("ops@example.com"));
    }

    #[test]
    fn test_user_agent_default_contact() {
        let ua = user_agent(None);
        assert!(ua.contains(DEFAULT_CONTACT));
    }

    #[test]
    fn test_cli_arg_takes_priority() {
        let cli = PathBuf::from("/tmp/tunelog-cli");
        let config = TomlConfig {
            root_folder: Some("/tmp/tunelog-toml".to_string()),
            ..Default::default()
        };
        let resolved = resolve_root_folder(Some(&cli), &config);
        assert_eq!(resolved, cli);
    }

    #[test]
    fn test_toml_root_used_when_no_cli_arg() {
        // Only valid when the environment variable is unset
        if std::env::var(ROOT_ENV_VAR).is_ok() {
            eprintln!("Skipping test: {} is set", ROOT_ENV_VAR);
            return;
        }
        let config = TomlConfig {
            root_folder: Some("/tmp/tunelog-toml".to_string()),
            ..Default::default()
        };
        let resolved = resolve_root_folder(None, &config);
        assert_eq!(resolved, PathBuf::from("/tmp/tunelog-toml"));
    }

    #[test]
    fn test_base_url_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.catalog_base_url(), DEFAULT_CATALOG_BASE_URL);
        assert_eq!(config.knowledge_graph_url(), DEFAULT_KNOWLEDGE_GRAPH_URL);
    }

    #[test]
    fn test_base_url_override() {
        let config = TomlConfig {
            catalog_base_url: Some("http://127.0.0.1:8089".to_string()),
            ..Default::default()
        };
        assert_eq!(config.catalog_base_url(), "http://127.0.0.1:8089");
    }

    #[test]
    fn test_config_parses_partial_toml() {
        let config: TomlConfig =
            toml::from_str("contact = \"ops@example.com\"").expect("Should parse");
        assert_eq!(config.contact.as_deref(), Some("ops@example.com"));
        assert!(config.root_folder.is_none());
    }
}
