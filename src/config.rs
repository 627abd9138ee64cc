use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub dbdir: Option<String>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub gemini: GeminiSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default)]
    pub tlscert: Option<String>,
    #[serde(default)]
    pub tlskey: Option<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: default_port(),
            tlscert: None,
            tlskey: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub sqlite: Option<SqliteConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SqliteConfig {
    pub filename: String,
}

/// Settings for the generative text-completion backend.
///
/// `auth` selects how the credential travels: `apikey` puts it in a
/// `?key=` query parameter, `bearer` in an `Authorization` header.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeminiSettings {
    #[serde(default = "default_gemini_baseurl")]
    pub baseurl: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default)]
    pub apikey: String,
    #[serde(default = "default_auth_mode")]
    pub auth: String,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            baseurl: default_gemini_baseurl(),
            model: default_gemini_model(),
            apikey: String::new(),
            auth: default_auth_mode(),
        }
    }
}

fn default_port() -> String {
    "8990".to_string()
}

fn default_gemini_baseurl() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_auth_mode() -> String {
    "apikey".to_string()
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_string(), e))?;

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_string(), e))?;

        Ok(config)
    }

    pub fn get_database_path(&self) -> Option<String> {
        if let Some(ref sqlite) = self.database.sqlite {
            return Some(sqlite.filename.clone());
        }

        if let Some(ref dbdir) = self.dbdir {
            let path = PathBuf::from(dbdir).join("cinerec.db");
            return Some(path.to_string_lossy().to_string());
        }

        None
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(String, std::io::Error),
    #[error("Failed to parse config file {0}: {1}")]
    ParseError(String, serde_yaml::Error),
    #[error("Unknown auth mode {0:?}, expected \"apikey\" or \"bearer\"")]
    InvalidAuthMode(String),
    #[error("No API credential configured (gemini.apikey)")]
    MissingCredential,
}
