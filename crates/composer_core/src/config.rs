use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use tracing::warn;

use crate::lookup::LookupSettings;

const SETTINGS_FILE: &str = "emr.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub csrf_cookie_name: String,
    pub csrf_header_name: String,
    pub csrf_token: Option<String>,
    pub session_cookie: Option<String>,
    pub debounce_ms: u64,
    pub min_query_chars: usize,
    pub search_page_size: u32,
    pub list_page_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000/".into(),
            csrf_cookie_name: "csrftoken".into(),
            csrf_header_name: "X-CSRFToken".into(),
            csrf_token: None,
            session_cookie: None,
            debounce_ms: 250,
            min_query_chars: 2,
            search_page_size: 20,
            list_page_size: 50,
        }
    }
}

impl Settings {
    pub fn lookup_settings(&self) -> LookupSettings {
        LookupSettings {
            debounce: Duration::from_millis(self.debounce_ms),
            min_query_chars: self.min_query_chars,
            search_page_size: self.search_page_size,
            list_page_size: self.list_page_size,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    csrf_cookie_name: Option<String>,
    csrf_header_name: Option<String>,
    csrf_token: Option<String>,
    session_cookie: Option<String>,
    debounce_ms: Option<u64>,
    min_query_chars: Option<usize>,
    search_page_size: Option<u32>,
    list_page_size: Option<u32>,
}

pub fn load_settings() -> Settings {
    let mut settings = load_settings_from(Path::new(SETTINGS_FILE));
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// Defaults overlaid with the file at `path`; a missing or malformed file
/// leaves the defaults untouched.
pub fn load_settings_from(path: &Path) -> Settings {
    let mut settings = Settings::default();

    let Ok(raw) = fs::read_to_string(path) else {
        return settings;
    };

    match toml::from_str::<FileSettings>(&raw) {
        Ok(file_cfg) => apply_file_settings(&mut settings, file_cfg),
        Err(err) => warn!(path = %path.display(), "config: ignoring malformed settings file: {err}"),
    }

    settings
}

fn apply_file_settings(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.csrf_cookie_name {
        settings.csrf_cookie_name = v;
    }
    if let Some(v) = file_cfg.csrf_header_name {
        settings.csrf_header_name = v;
    }
    if file_cfg.csrf_token.is_some() {
        settings.csrf_token = file_cfg.csrf_token;
    }
    if file_cfg.session_cookie.is_some() {
        settings.session_cookie = file_cfg.session_cookie;
    }
    if let Some(v) = file_cfg.debounce_ms {
        settings.debounce_ms = v;
    }
    if let Some(v) = file_cfg.min_query_chars {
        settings.min_query_chars = v;
    }
    if let Some(v) = file_cfg.search_page_size {
        settings.search_page_size = v;
    }
    if let Some(v) = file_cfg.list_page_size {
        settings.list_page_size = v;
    }
}

pub fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("EMR_API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = var("EMR_CSRF_TOKEN") {
        settings.csrf_token = Some(v);
    }
    if let Some(v) = var("EMR_SESSION_COOKIE") {
        settings.session_cookie = Some(v);
    }

    if let Some(v) = var("APP__DEBOUNCE_MS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.debounce_ms = parsed,
            Err(_) => warn!(value = %v, "config: ignoring non-numeric APP__DEBOUNCE_MS"),
        }
    }
    if let Some(v) = var("APP__SEARCH_PAGE_SIZE") {
        match v.parse::<u32>() {
            Ok(parsed) => settings.search_page_size = parsed,
            Err(_) => warn!(value = %v, "config: ignoring non-numeric APP__SEARCH_PAGE_SIZE"),
        }
    }
    if let Some(v) = var("APP__LIST_PAGE_SIZE") {
        match v.parse::<u32>() {
            Ok(parsed) => settings.list_page_size = parsed,
            Err(_) => warn!(value = %v, "config: ignoring non-numeric APP__LIST_PAGE_SIZE"),
        }
    }
}
