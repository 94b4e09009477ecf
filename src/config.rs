//! Configuration for alibi paths and services.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (ALIBI_HOME, ALIBI_MEDIA, ALIBI_INDEXER,
//!    ALIBI_ENDPOINT, ALIBI_API_TOKEN)
//! 2. Config file (.alibi/config.yaml)
//! 3. Defaults (~/.alibi, fixture indexer)
//!
//! Config file discovery:
//! - Searches current directory and parents for .alibi/config.yaml
//! - Paths in config file are relative to the config file's parent directory
//!
//! There is no global config singleton: `Config::load` returns a value
//! the caller passes down explicitly, so tests and embedders can build
//! their own.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::tracker::RetryPolicy;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub indexer: Option<IndexerConfig>,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory: journal and reports (relative to config file)
    pub home: Option<String>,
    /// Media directory: video files and sidecar metadata
    pub media: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexerConfig {
    pub mode: Option<IndexerMode>,
    pub endpoint: Option<String>,
    pub api_token: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub fixtures_dir: Option<String>,
}

/// Which video indexer backs the tracker. Selected here, in
/// configuration, never inferred from request contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexerMode {
    /// External video understanding service over HTTP
    Live,
    /// Canned analyses from local JSON files
    Fixture,
}

impl Default for IndexerMode {
    fn default() -> Self {
        IndexerMode::Fixture
    }
}

impl std::fmt::Display for IndexerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexerMode::Live => write!(f, "live"),
            IndexerMode::Fixture => write!(f, "fixture"),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct Config {
    /// Absolute path to alibi home (journal, reports)
    pub home: PathBuf,
    /// Absolute path to the media store
    pub media: PathBuf,
    /// Indexer selection and credentials
    pub indexer: IndexerSettings,
    /// Retry policy for upstream submissions
    pub retry: RetryPolicy,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct IndexerSettings {
    pub mode: IndexerMode,
    pub endpoint: Option<String>,
    pub api_token: Option<String>,
    pub timeout_seconds: u64,
    pub fixtures_dir: PathBuf,
}

/// What the current configuration can actually reach. Shown by
/// `alibi doctor` and checked before jobs are submitted.
#[derive(Debug, Clone)]
pub struct Availability {
    pub live_indexer: bool,
    pub fixture_indexer: bool,
    pub notes: Vec<String>,
}

impl Config {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self> {
        let default_home = dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(".alibi");

        let config_file = find_config_file();
        let parsed = match &config_file {
            Some(path) => Some(load_config_file(path)?),
            None => None,
        };

        // Base for relative paths is the parent of .alibi/
        let base_dir = config_file
            .as_deref()
            .and_then(|p| p.parent())
            .and_then(|p| p.parent())
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let paths = parsed.as_ref().map(|c| c.paths.clone()).unwrap_or_default();
        let indexer_file = parsed
            .as_ref()
            .and_then(|c| c.indexer.clone())
            .unwrap_or_default();
        let retry = parsed.as_ref().and_then(|c| c.retry.clone()).unwrap_or_default();

        let home = if let Ok(env_home) = std::env::var("ALIBI_HOME") {
            PathBuf::from(env_home)
        } else if let Some(home_path) = &paths.home {
            resolve_path(&base_dir, home_path)
        } else {
            default_home
        };

        let media = if let Ok(env_media) = std::env::var("ALIBI_MEDIA") {
            PathBuf::from(env_media)
        } else if let Some(media_path) = &paths.media {
            resolve_path(&base_dir, media_path)
        } else {
            home.join("media")
        };

        let mode = match std::env::var("ALIBI_INDEXER") {
            Ok(raw) => parse_mode(&raw)?,
            Err(_) => indexer_file.mode.unwrap_or_default(),
        };
        let endpoint = std::env::var("ALIBI_ENDPOINT").ok().or(indexer_file.endpoint);
        let api_token = std::env::var("ALIBI_API_TOKEN").ok().or(indexer_file.api_token);
        let fixtures_dir = indexer_file
            .fixtures_dir
            .map(|p| resolve_path(&base_dir, &p))
            .unwrap_or_else(|| home.join("fixtures"));

        Ok(Config {
            home,
            media,
            indexer: IndexerSettings {
                mode,
                endpoint,
                api_token,
                timeout_seconds: indexer_file.timeout_seconds.unwrap_or(30),
                fixtures_dir,
            },
            retry,
            config_file,
        })
    }

    /// Journal file holding the append-only job event log
    pub fn journal_path(&self) -> PathBuf {
        self.home.join("journal").join("jobs.jsonl")
    }

    /// Directory credibility reports are written to
    pub fn reports_dir(&self) -> PathBuf {
        self.home.join("reports")
    }

    /// Check the selected indexer can actually run. Live mode without an
    /// endpoint and token is a configuration error, not a runtime
    /// surprise.
    pub fn validate(&self) -> Result<()> {
        if self.indexer.mode == IndexerMode::Live {
            if self.indexer.endpoint.is_none() {
                bail!(
                    "indexer mode is 'live' but no endpoint is configured \
                     (set ALIBI_ENDPOINT or indexer.endpoint in .alibi/config.yaml)"
                );
            }
            if self.indexer.api_token.is_none() {
                bail!(
                    "indexer mode is 'live' but no API token is configured \
                     (set ALIBI_API_TOKEN or indexer.api_token in .alibi/config.yaml)"
                );
            }
        }
        Ok(())
    }

    /// Availability flags for `doctor`
    pub fn availability(&self) -> Availability {
        let mut notes = Vec::new();

        let live_indexer =
            self.indexer.endpoint.is_some() && self.indexer.api_token.is_some();
        if !live_indexer {
            if self.indexer.endpoint.is_none() {
                notes.push("live indexer unavailable: no endpoint configured".to_string());
            }
            if self.indexer.api_token.is_none() {
                notes.push("live indexer unavailable: no API token configured".to_string());
            }
        }

        let fixture_indexer = self.indexer.fixtures_dir.is_dir();
        if !fixture_indexer {
            notes.push(format!(
                "fixture indexer unavailable: {} is not a directory",
                self.indexer.fixtures_dir.display()
            ));
        }

        Availability { live_indexer, fixture_indexer, notes }
    }
}

fn parse_mode(raw: &str) -> Result<IndexerMode> {
    match raw.trim().to_lowercase().as_str() {
        "live" => Ok(IndexerMode::Live),
        "fixture" => Ok(IndexerMode::Fixture),
        other => bail!("unknown indexer mode '{}' (expected 'live' or 'fixture')", other),
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".alibi").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn fixture_config(mode: IndexerMode, endpoint: Option<&str>, token: Option<&str>) -> Config {
        Config {
            home: PathBuf::from("/test/.alibi"),
            media: PathBuf::from("/test/media"),
            indexer: IndexerSettings {
                mode,
                endpoint: endpoint.map(String::from),
                api_token: token.map(String::from),
                timeout_seconds: 30,
                fixtures_dir: PathBuf::from("/test/fixtures"),
            },
            retry: RetryPolicy::default(),
            config_file: None,
        }
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let alibi_dir = temp.path().join(".alibi");
        std::fs::create_dir_all(&alibi_dir).unwrap();

        let config_path = alibi_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  home: ./state
  media: ./media
indexer:
  mode: fixture
  fixtures_dir: ./fixtures
  timeout_seconds: 10
retry:
  max_attempts: 5
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.paths.home, Some("./state".to_string()));
        let indexer = config.indexer.unwrap();
        assert_eq!(indexer.mode, Some(IndexerMode::Fixture));
        assert_eq!(indexer.timeout_seconds, Some(10));
        assert_eq!(config.retry.unwrap().max_attempts, 5);
    }

    #[test]
    fn test_validate_live_mode_requires_credentials() {
        let missing_both = fixture_config(IndexerMode::Live, None, None);
        assert!(missing_both.validate().is_err());

        let missing_token =
            fixture_config(IndexerMode::Live, Some("https://api.example.com/v1"), None);
        let err = missing_token.validate().unwrap_err().to_string();
        assert!(err.contains("token"), "unexpected error: {}", err);

        let complete = fixture_config(
            IndexerMode::Live,
            Some("https://api.example.com/v1"),
            Some("tlk_secret"),
        );
        assert!(complete.validate().is_ok());
    }

    #[test]
    fn test_validate_fixture_mode_needs_no_credentials() {
        let config = fixture_config(IndexerMode::Fixture, None, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_availability_notes_name_missing_pieces() {
        let config = fixture_config(IndexerMode::Fixture, None, None);
        let availability = config.availability();

        assert!(!availability.live_indexer);
        assert!(availability.notes.iter().any(|n| n.contains("endpoint")));
        assert!(availability.notes.iter().any(|n| n.contains("token")));
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("live").unwrap(), IndexerMode::Live);
        assert_eq!(parse_mode(" Fixture ").unwrap(), IndexerMode::Fixture);
        assert!(parse_mode("mock").is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
        // Nonexistent relative path falls back to plain join
        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/./subdir")
        );
    }

    #[test]
    fn test_journal_and_reports_paths() {
        let config = fixture_config(IndexerMode::Fixture, None, None);
        assert_eq!(config.journal_path(), PathBuf::from("/test/.alibi/journal/jobs.jsonl"));
        assert_eq!(config.reports_dir(), PathBuf::from("/test/.alibi/reports"));
    }
}
