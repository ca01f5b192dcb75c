use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Default config file path, relative to the working directory.
pub const CONFIG_FILE: &str = "config.json";

/// Session cookie parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    /// Name of the session cookie.
    pub name: String,
    /// Signing key reserved for the cookie layer.
    pub key: String,
    /// Session lifetime in days.
    pub expiry_days: u64,
}

/// Static application configuration, loaded once at startup and never
/// mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub cookie: CookieConfig,

    /// Pre-authorized email allowlist; an empty list means registration is
    /// open to any email.
    #[serde(default)]
    pub preauthorized: Vec<String>,

    /// Sheet file backing the users table.
    pub users_sheet: PathBuf,

    /// Sheet file backing the recipes table.
    pub recipes_sheet: PathBuf,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

/// Loads the configuration document from `path`.
pub fn load_config(path: &Path) -> Result<AppConfig, AppError> {
    let data = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            AppError::NotFound(format!("config file {} does not exist", path.display()))
        }
        _ => AppError::Network(e.to_string()),
    })?;
    serde_json::from_str(&data).map_err(|e| AppError::Api(format!("malformed config: {e}")))
}
