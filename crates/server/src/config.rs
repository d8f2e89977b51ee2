use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use library::{ExtractFailurePolicy, RootProvider, SyncOptions};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

const DEFAULT_INDEX_PATH: &str = "library.redb";
const DEFAULT_PORT: u16 = 3000;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub version: u32,
    /// Empty until the user picks a folder.
    pub music_root: String,
    pub index_path: String,
    pub port: u16,
    pub extensions: Vec<String>,
    pub extract_failure: ExtractFailurePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            music_root: "".to_string(),
            index_path: DEFAULT_INDEX_PATH.to_string(),
            port: DEFAULT_PORT,
            extensions: vec!["mp3".to_string()],
            extract_failure: ExtractFailurePolicy::Abort,
        }
    }
}

impl ServerConfig {
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            extensions: self.extensions.clone(),
            on_extract_failure: self.extract_failure,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("MEDLEY_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

pub fn load_or_create_config(path: &Path) -> Result<(ServerConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: ServerConfig = serde_yaml::from_str(&contents)?;
        if config.version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
        }
        if config.index_path.trim().is_empty() {
            config.index_path = DEFAULT_INDEX_PATH.to_string();
        }
        if config.port == 0 {
            config.port = DEFAULT_PORT;
        }
        config
            .extensions
            .retain(|ext| !ext.trim_start_matches('.').trim().is_empty());
        if config.extensions.is_empty() {
            config.extensions.push("mp3".to_string());
        }
        return Ok((config, false));
    }

    let config = ServerConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

/// Persists a new music root, then applies it to the live config. The live
/// config is left untouched when the write fails.
pub fn set_music_root(
    path: &Path,
    config: &RwLock<ServerConfig>,
    music_root: &str,
) -> Result<(), ConfigError> {
    let mut guard = config.write();
    let mut updated = guard.clone();
    updated.music_root = music_root.to_string();
    save_config(path, &updated)?;
    *guard = updated;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

pub fn resolve_music_root(config_path: &Path, value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(resolve_path(config_path, trimmed))
    }
}

/// Library root read from the live config on every call.
pub struct ConfigRoot {
    config_path: PathBuf,
    config: Arc<RwLock<ServerConfig>>,
}

impl ConfigRoot {
    pub fn new(config_path: PathBuf, config: Arc<RwLock<ServerConfig>>) -> Self {
        Self {
            config_path,
            config,
        }
    }
}

impl RootProvider for ConfigRoot {
    fn library_root(&self) -> Option<String> {
        let music_root = self.config.read().music_root.clone();
        resolve_music_root(&self.config_path, &music_root)
            .map(|path| path.to_string_lossy().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_default_config_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("config.yaml");

        let (config, created) = load_or_create_config(&path).unwrap();
        assert!(created);
        assert!(path.exists());
        assert_eq!(config.index_path, "library.redb");
        assert_eq!(config.extensions, vec!["mp3".to_string()]);

        let (again, created) = load_or_create_config(&path).unwrap();
        assert!(!created);
        assert_eq!(again.port, 3000);
    }

    #[test]
    fn fills_blank_fields_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "music_root: /srv/music\nindex_path: ''\nport: 0\nextensions: ['', '.']\nextract_failure: skip\n",
        )
        .unwrap();

        let (config, created) = load_or_create_config(&path).unwrap();
        assert!(!created);
        assert_eq!(config.music_root, "/srv/music");
        assert_eq!(config.index_path, "library.redb");
        assert_eq!(config.port, 3000);
        assert_eq!(config.extensions, vec!["mp3".to_string()]);
        assert_eq!(config.extract_failure, ExtractFailurePolicy::Skip);
        assert_eq!(config.version, CONFIG_VERSION);
    }

    #[test]
    fn music_root_resolves_against_config_dir() {
        let config_path = Path::new("/etc/medley/config.yaml");
        assert_eq!(resolve_music_root(config_path, "  "), None);
        assert_eq!(
            resolve_music_root(config_path, "music"),
            Some(PathBuf::from("/etc/medley/music"))
        );
        assert_eq!(
            resolve_music_root(config_path, "/srv/music"),
            Some(PathBuf::from("/srv/music"))
        );
    }

    #[test]
    fn config_root_follows_live_config() {
        let config = Arc::new(RwLock::new(ServerConfig::default()));
        let root = ConfigRoot::new(PathBuf::from("/etc/medley/config.yaml"), Arc::clone(&config));
        assert_eq!(root.library_root(), None);

        config.write().music_root = "/srv/music".to_string();
        assert_eq!(root.library_root().as_deref(), Some("/srv/music"));
    }

    #[test]
    fn music_root_change_is_saved_before_applied() {
        let dir = tempfile::tempdir().unwrap();
        let config = RwLock::new(ServerConfig::default());

        let path = dir.path().join("config.yaml");
        set_music_root(&path, &config, "/srv/music").unwrap();
        assert_eq!(config.read().music_root, "/srv/music");
        let (saved, _) = load_or_create_config(&path).unwrap();
        assert_eq!(saved.music_root, "/srv/music");

        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();
        let unwritable = blocker.join("config.yaml");
        assert!(set_music_root(&unwritable, &config, "/elsewhere").is_err());
        assert_eq!(config.read().music_root, "/srv/music");
    }
}
