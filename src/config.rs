// src/config.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::app_log;

pub const DEVELOPMENT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const PRODUCTION_BASE_URL: &str = "https://api.jobboard.app";

const DEFAULT_STORAGE_PATH: &str = ".jobboard/tokens.json";
const DEFAULT_LOGIN_ROUTE: &str = "/login";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings shared by the authenticated and public clients. Resolved once
/// at startup and fixed afterwards.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub environment: String,
    pub base_url: String,
    pub storage_path: PathBuf,
    pub login_route: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Default, Deserialize)]
struct EnvironmentSection {
    base_url: Option<String>,
    storage_path: Option<PathBuf>,
    login_route: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    development: EnvironmentSection,
    #[serde(default)]
    production: EnvironmentSection,
}

impl ClientConfig {
    /// Load configuration for the current environment from `config.yaml`
    /// in the working directory, falling back to built-in defaults.
    pub fn load() -> Result<Self> {
        let environment = Self::get_environment();
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        let base_url_override = std::env::var("JOBBOARD_BASE_URL").ok();

        Self::load_with(&environment, &current_dir, base_url_override)
    }

    fn get_environment() -> String {
        std::env::var("JOBBOARD_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .or_else(|_| std::env::var("ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    pub fn load_with(
        environment: &str,
        root_dir: &Path,
        base_url_override: Option<String>,
    ) -> Result<Self> {
        app_log!(info, "Loading client configuration for environment: {}", environment);

        let config_path = root_dir.join("config.yaml");
        let config_file = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            serde_yaml::from_str::<ConfigFile>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            ConfigFile::default()
        };

        let is_production = Self::is_production(environment);
        let section = if is_production {
            config_file.production
        } else {
            config_file.development
        };

        let default_base_url = if is_production {
            PRODUCTION_BASE_URL
        } else {
            DEVELOPMENT_BASE_URL
        };

        let base_url = base_url_override
            .or(section.base_url)
            .unwrap_or_else(|| default_base_url.to_string());

        let storage_path = section
            .storage_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH));

        Ok(Self {
            environment: environment.to_string(),
            base_url: normalize_base_url(&base_url)?,
            storage_path: resolve_path(root_dir, &storage_path),
            login_route: section
                .login_route
                .unwrap_or_else(|| DEFAULT_LOGIN_ROUTE.to_string()),
            timeout_seconds: section.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }

    fn is_production(environment: &str) -> bool {
        matches!(environment, "production" | "prod")
    }

    /// Join an API path onto the base URL.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let parsed =
        url::Url::parse(raw.trim()).with_context(|| format!("Invalid base URL: {}", raw))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("Base URL must use http or https: {}", raw);
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

fn resolve_path(root_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root_dir.join(path)
    }
}
