use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::{self, CONFIG_FILE, DATA_DIR_ENV, TEMPLATES_FILE};
use crate::models::{AppConfig, Template};

const DATA_DIR: &str = ".pixel-painter";

pub fn get_data_dir() -> Result<PathBuf, String> {
    fn ensure_dir(path: &PathBuf) -> Result<(), String> {
        if !path.exists() {
            fs::create_dir_all(path).map_err(|e| format!("failed_to_create_data_dir: {}", e))?;
        }
        Ok(())
    }
    if let Ok(env_path) = std::env::var(DATA_DIR_ENV) {
        if !env_path.trim().is_empty() {
            let data_dir = PathBuf::from(env_path);
            ensure_dir(&data_dir)?;
            return Ok(data_dir);
        }
    }
    if cfg!(test) {
        let data_dir =
            std::env::temp_dir().join(format!(".pixel-painter-test-{}", std::process::id()));
        ensure_dir(&data_dir)?;
        return Ok(data_dir);
    }

    if let Some(home) = dirs::home_dir() {
        let data_dir = home.join(DATA_DIR);
        if ensure_dir(&data_dir).is_ok() {
            return Ok(data_dir);
        }
    }
    let fallback_dir = std::env::temp_dir().join(DATA_DIR);
    ensure_dir(&fallback_dir)?;
    Ok(fallback_dir)
}

/// Reads `config.json`, writing the defaults first when the file is missing.
pub fn load_app_config(data_dir: &Path) -> Result<AppConfig, String> {
    let config_path = data_dir.join(CONFIG_FILE);

    if !config_path.exists() {
        let config = AppConfig::new();
        if let Err(e) = save_app_config(data_dir, &config) {
            warn!("Could not write default config: {}", e);
        }
        return Ok(config);
    }

    let content = fs::read_to_string(&config_path)
        .map_err(|e| format!("failed_to_read_config_file: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("failed_to_parse_config_file: {}", e))
}
pub fn save_app_config(data_dir: &Path, config: &AppConfig) -> Result<(), String> {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("failed_to_serialize_config: {}", e))?;

    fs::write(&config_path, content).map_err(|e| format!("failed_to_save_config: {}", e))
}

pub(crate) fn parse_env_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(url) = std::env::var("PXP_API_BASE_URL") {
        if !url.trim().is_empty() {
            info!("Using API base URL from environment");
            config.api_base_url = url.trim().to_string();
        }
    }

    if let Ok(raw) = std::env::var("PXP_CONCURRENCY") {
        match raw.trim().parse::<usize>() {
            Ok(limit) => {
                info!("Using concurrency limit from environment: {}", limit);
                config.painting.concurrency_limit = limit;
            }
            Err(_) => warn!("Ignoring invalid PXP_CONCURRENCY value: {}", raw),
        }
    }

    if let Ok(raw) = std::env::var("PXP_DOUBLE_VERIFY") {
        match parse_env_bool(&raw) {
            Some(enabled) => config.painting.double_verify = enabled,
            None => warn!("Ignoring invalid PXP_DOUBLE_VERIFY value: {}", raw),
        }
    }

    if let Ok(raw) = std::env::var("PXP_CONTINUOUS") {
        match parse_env_bool(&raw) {
            Some(enabled) => config.painting.continuous = enabled,
            None => warn!("Ignoring invalid PXP_CONTINUOUS value: {}", raw),
        }
    }
}

/// Loads `templates.json`. Relative image paths are resolved against the
/// data directory.
pub fn load_templates(data_dir: &Path) -> Result<Vec<Template>, String> {
    let path = data_dir.join(TEMPLATES_FILE);
    let content = fs::read_to_string(&path)
        .map_err(|e| format!("failed_to_read_templates_file: {}: {}", path.display(), e))?;
    let mut templates: Vec<Template> = serde_json::from_str(&content)
        .map_err(|e| format!("failed_to_parse_templates_file: {}", e))?;

    for template in &mut templates {
        if let Some(image) = template.image.as_mut() {
            if image.is_relative() {
                *image = data_dir.join(&*image);
            }
        }
    }
    Ok(templates)
}

/// One entry per non-blank line. A missing file is an empty list.
pub fn load_line_list(path: &Path) -> Result<Vec<String>, String> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)
        .map_err(|e| format!("failed_to_read_list_file: {}: {}", path.display(), e))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn load_proxies(data_dir: &Path) -> Result<Vec<String>, String> {
    load_line_list(&data_dir.join(constants::PROXIES_FILE))
}

pub fn load_user_agents(data_dir: &Path) -> Result<Vec<String>, String> {
    load_line_list(&data_dir.join(constants::USER_AGENTS_FILE))
}
