use crate::colors::{Rgb, DEFAULT_PALETTE};
use crate::error::AppError;
use crate::models::Query;
use crate::providers::openai::DEFAULT_BASE_URL;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SERVICE_NAME: &str = "usage-charts";

fn app_home_dir() -> Result<PathBuf, AppError> {
    if let Ok(custom) = std::env::var("USAGE_CHARTS_HOME") {
        return Ok(PathBuf::from(custom));
    }

    if let Some(dirs) = ProjectDirs::from("dev", "usage-charts", SERVICE_NAME) {
        let candidate = dirs.data_local_dir().to_path_buf();
        if fs::create_dir_all(&candidate).is_ok() {
            return Ok(candidate);
        }
    }

    let cwd = std::env::current_dir()?;
    Ok(cwd.join(".usage-charts"))
}

/// Holds no credentials; those are supplied per run and never written to disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub default_window: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub palette: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.into(),
            default_window: "7d".into(),
            request_timeout_seconds: None,
            palette: vec![],
        }
    }
}

impl AppConfig {
    pub fn default_query(&self) -> Result<Query, AppError> {
        self.default_window.parse().map_err(|_| {
            AppError::Config(format!(
                "invalid default_window '{}' in config.toml",
                self.default_window
            ))
        })
    }

    pub fn palette(&self) -> Result<Vec<Rgb>, AppError> {
        if self.palette.is_empty() {
            return Ok(DEFAULT_PALETTE.to_vec());
        }
        if self.palette.len() != DEFAULT_PALETTE.len() {
            return Err(AppError::Config(format!(
                "palette must list exactly {} colors, found {}",
                DEFAULT_PALETTE.len(),
                self.palette.len()
            )));
        }
        self.palette
            .iter()
            .map(|raw| {
                Rgb::parse_hex(raw)
                    .ok_or_else(|| AppError::Config(format!("invalid palette color '{raw}'")))
            })
            .collect()
    }
}

pub fn config_dir() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join("config"))
}

pub fn config_path() -> Result<PathBuf, AppError> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn ensure_dirs() -> Result<(), AppError> {
    fs::create_dir_all(config_dir()?)?;
    Ok(())
}

fn normalize_config(config: &mut AppConfig) -> bool {
    let mut changed = false;

    let window = config.default_window.trim().to_ascii_lowercase();
    if window != config.default_window {
        config.default_window = window;
        changed = true;
    }

    let base = config.api_base_url.trim().to_string();
    if base != config.api_base_url {
        config.api_base_url = base;
        changed = true;
    }
    if config.api_base_url.is_empty() {
        config.api_base_url = DEFAULT_BASE_URL.into();
        changed = true;
    }

    changed
}

pub fn load_config() -> Result<AppConfig, AppError> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(&path)?;
    let mut parsed: AppConfig = toml::from_str(&raw)?;
    if normalize_config(&mut parsed) {
        save_config(&parsed)?;
    }

    Ok(parsed)
}

pub fn save_config(config: &AppConfig) -> Result<(), AppError> {
    ensure_dirs()?;
    let path = config_path()?;
    let raw = toml::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}

pub fn ensure_initialized() -> Result<(), AppError> {
    ensure_dirs()?;
    let cfg_path = config_path()?;
    if !Path::new(&cfg_path).exists() {
        save_config(&AppConfig::default())?;
    }
    Ok(())
}
