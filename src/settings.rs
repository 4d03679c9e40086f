// Import necessary libraries and modules for file I/O and serialization.
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BUCKET: &str = "characters";

// Environment variables checked in order; the first one that is set wins.
const URL_VARS: [&str; 3] = ["VITE_SUPABASE_URL", "SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"];
const ANON_KEY_VARS: [&str; 3] = [
    "VITE_SUPABASE_ANON_KEY",
    "SUPABASE_ANON_KEY",
    "NEXT_PUBLIC_SUPABASE_ANON_KEY",
];
const SERVICE_KEY_VARS: [&str; 3] = [
    "SUPABASE_SERVICE_ROLE",
    "SUPABASE_SERVICE_KEY",
    "SUPABASE_SERVICE_ROLE_KEY",
];

pub fn get_data_dir() -> PathBuf {
    dir::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("log_pose")
        .join("data")
}

// Application settings, persisted as pretty JSON in the data directory.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
    pub service_role_key: Option<String>, // Enables the privileged master and fallback paths.
    pub storage_bucket: String,
    pub signed_url_expiry_secs: u64,
    pub edit_debounce_ms: u64,
    pub pdfium_lib_path: Option<String>,
    pub export_dir: Option<PathBuf>,
    pub offline_cache: bool,
    pub debug_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            backend_url: None,
            anon_key: None,
            service_role_key: None,
            storage_bucket: DEFAULT_BUCKET.to_string(),
            signed_url_expiry_secs: 60,
            edit_debounce_ms: 300,
            pdfium_lib_path: None,
            export_dir: None,
            offline_cache: true,
            debug_mode: false,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    // Load settings from the default file path.
    pub fn load() -> io::Result<Self> {
        Self::load_settings_from_file(get_data_dir().join("settings.json"))
    }

    // Save current settings to the default file path.
    pub fn save(&self) -> io::Result<()> {
        self.save_to_file(get_data_dir().join("settings.json"))
    }

    pub fn load_settings_from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let data = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&data)?;
        Ok(settings)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        let data = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        file.write_all(data.as_bytes())?;
        Ok(())
    }

    pub fn with_env_overrides(self) -> Self {
        self.apply_env(|key| std::env::var(key).ok())
    }

    // Environment values take precedence over the file so deployments can inject keys.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(key))
                .find(|value| !value.trim().is_empty())
        };
        if let Some(url) = first(&URL_VARS) {
            self.backend_url = Some(url);
        }
        if let Some(key) = first(&ANON_KEY_VARS) {
            self.anon_key = Some(key);
        }
        if let Some(key) = first(&SERVICE_KEY_VARS) {
            self.service_role_key = Some(key);
        }
        if let Some(path) = first(&["PDFIUM_LIB_PATH"]) {
            self.pdfium_lib_path = Some(path);
        }
        self
    }

    pub fn is_configured(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        present(&self.backend_url) && present(&self.anon_key)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.edit_debounce_ms)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| get_data_dir().join("exports"))
    }

    pub fn cache_path(&self) -> PathBuf {
        get_data_dir().join("cache.sqlite3")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn settings_round_trip_through_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            backend_url: Some("https://example.supabase.co".to_string()),
            edit_debounce_ms: 150,
            ..Settings::default()
        };
        settings.save_to_file(&path).expect("save");
        let loaded = Settings::load_settings_from_file(&path).expect("load");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"debug_mode": true}"#).unwrap();
        assert!(settings.debug_mode);
        assert_eq!(settings.storage_bucket, "characters");
        assert_eq!(settings.debounce(), Duration::from_millis(300));
    }

    #[test]
    fn env_overrides_follow_fallback_order() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SUPABASE_URL", "https://second.example"),
            ("NEXT_PUBLIC_SUPABASE_URL", "https://third.example"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
        ]);
        let settings =
            Settings::default().apply_env(|key| env.get(key).map(|value| value.to_string()));
        assert_eq!(settings.backend_url.as_deref(), Some("https://second.example"));
        assert_eq!(settings.service_role_key.as_deref(), Some("service"));
        assert!(settings.is_configured());
    }

    #[test]
    fn blank_values_do_not_configure() {
        let settings = Settings {
            backend_url: Some("  ".to_string()),
            anon_key: Some("anon".to_string()),
            ..Settings::default()
        };
        assert!(!settings.is_configured());
    }
}
