//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 10;
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[".docx", ".pdf"];

pub const DEFAULT_GENERATION_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/text-embedding-004";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// Paths to the Lexi data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite database file (`data/lexi.db` unless `DATABASE_URL` says otherwise).
    pub database: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory and a database URL. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>, database_url: &str) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            database: database_path(database_url),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        if let Some(parent) = self.database.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Turn a `sqlite://` style connection string into a file path.
///
/// Follows the SQLAlchemy convention: `sqlite:///./data/lexi.db` and
/// `sqlite:///data/lexi.db` are relative, `sqlite:////var/lexi.db` is
/// absolute. A string without the scheme is used as a path verbatim.
pub fn database_path(database_url: &str) -> PathBuf {
    let Some(rest) = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
    else {
        return PathBuf::from(database_url);
    };
    PathBuf::from(rest.strip_prefix('/').unwrap_or(rest))
}

/// Settings for the remote completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
    /// Auxiliary search provider key. Not used by the core flow.
    #[serde(skip_serializing)]
    pub exa_api_key: Option<String>,
    /// Default generation model, replaced by discovery when it succeeds.
    pub generation_model: String,
    /// Default embedding model, replaced by discovery when it succeeds.
    pub embedding_model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            exa_api_key: None,
            generation_model: DEFAULT_GENERATION_MODEL.into(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.into(),
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
        }
    }
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level Lexi configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Upload size cap in megabytes.
    pub max_file_size_mb: u64,
    /// Accepted upload extensions, lowercase with leading dot.
    pub allowed_extensions: Vec<String>,
    /// Seed the sample templates when the catalog is empty.
    pub seed_samples: bool,
    pub llm: LlmSettings,
}

impl LexiConfig {
    /// Create configuration from the process environment (and `.env` if present).
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(data_dir, |key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    pub fn from_lookup(
        data_dir: impl AsRef<Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> std::io::Result<Self> {
        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| {
            data_dir.as_ref().join("lexi.db").to_string_lossy().into_owned()
        });
        let data_paths = DataPaths::new(&data_dir, &database_url)?;

        let max_file_size_mb = lookup("MAX_FILE_SIZE_MB")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_FILE_SIZE_MB);

        let allowed_extensions = lookup("ALLOWED_EXTENSIONS")
            .map(|v| parse_extensions(&v))
            .filter(|exts| !exts.is_empty())
            .unwrap_or_else(|| {
                DEFAULT_ALLOWED_EXTENSIONS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        let seed_samples = lookup("LEXI_SEED")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        let defaults = LlmSettings::default();
        let llm = LlmSettings {
            gemini_api_key: lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()),
            exa_api_key: lookup("EXA_API_KEY").filter(|k| !k.trim().is_empty()),
            generation_model: lookup("GEMINI_MODEL").unwrap_or(defaults.generation_model),
            embedding_model: lookup("GEMINI_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            base_url: lookup("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            timeout_secs: lookup("LLM_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        };

        Ok(Self {
            port,
            data_paths,
            max_file_size_mb,
            allowed_extensions,
            seed_samples,
            llm,
        })
    }

    /// Upload size cap in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_file_size_mb as usize) * 1024 * 1024
    }
}

/// Parse a comma separated extension list into `.ext` lowercase entries.
fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().trim_matches(|c| c == '"' || c == '[' || c == ']'))
        .filter(|e| !e.is_empty())
        .map(|e| {
            let e = e.to_lowercase();
            if e.starts_with('.') {
                e
            } else {
                format!(".{}", e)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_database_path_forms() {
        assert_eq!(database_path("sqlite:///./data/lexi.db"), PathBuf::from("./data/lexi.db"));
        assert_eq!(database_path("sqlite://./data/lexi.db"), PathBuf::from("./data/lexi.db"));
        assert_eq!(database_path("sqlite:////var/lib/lexi.db"), PathBuf::from("/var/lib/lexi.db"));
        assert_eq!(database_path("sqlite:///data/lexi.db"), PathBuf::from("data/lexi.db"));
        assert_eq!(database_path("/srv/lexi.db"), PathBuf::from("/srv/lexi.db"));
    }

    #[test]
    fn test_defaults() {
        let dir = TempDir::new().unwrap();
        let config = LexiConfig::from_lookup(dir.path(), lookup_from(&[])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.max_file_size_mb, 10);
        assert_eq!(config.allowed_extensions, vec![".docx", ".pdf"]);
        assert!(config.seed_samples);
        assert!(config.llm.gemini_api_key.is_none());
        assert_eq!(config.llm.generation_model, DEFAULT_GENERATION_MODEL);
        assert_eq!(config.data_paths.database, dir.path().join("lexi.db"));
        assert_eq!(config.max_upload_bytes(), 10 * 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("nested").join("custom.db");
        let db_url = format!("sqlite:///{}", db.display());
        let config = LexiConfig::from_lookup(
            dir.path(),
            lookup_from(&[
                ("PORT", "9100"),
                ("DATABASE_URL", &db_url),
                ("MAX_FILE_SIZE_MB", "2"),
                ("ALLOWED_EXTENSIONS", "PDF, .docx"),
                ("GEMINI_API_KEY", "secret"),
                ("LEXI_SEED", "false"),
            ]),
        )
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.data_paths.database, db);
        assert!(db.parent().unwrap().exists());
        assert_eq!(config.allowed_extensions, vec![".pdf", ".docx"]);
        assert_eq!(config.llm.gemini_api_key.as_deref(), Some("secret"));
        assert!(!config.seed_samples);
    }

    #[test]
    fn test_blank_api_key_is_unset() {
        let dir = TempDir::new().unwrap();
        let config =
            LexiConfig::from_lookup(dir.path(), lookup_from(&[("GEMINI_API_KEY", "  ")])).unwrap();
        assert!(config.llm.gemini_api_key.is_none());
    }
}
