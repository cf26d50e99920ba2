use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub library: LibraryConfig,
}

/// How the external mpv process is found and talked to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Explicit mpv binary; searched beside the exe and on PATH when unset.
    #[serde(default)]
    pub binary: Option<PathBuf>,
    /// How long to wait for the IPC endpoint to appear after spawning.
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Bound on the `--version` probe run once at startup.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_volume")]
    pub default_volume: f64,
    #[serde(default = "default_volume_step")]
    pub volume_step: f64,
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    #[serde(default = "default_status_ttl_secs")]
    pub status_ttl_secs: u64,
    #[serde(default = "default_theme")]
    pub theme: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default = "platform::default_music_dir")]
    pub start_dir: PathBuf,
    /// Lower-case file extensions the browser lists as playable.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: None,
            startup_timeout_ms: default_startup_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            volume_step: default_volume_step(),
            target_fps: default_target_fps(),
            status_ttl_secs: default_status_ttl_secs(),
            theme: default_theme(),
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            start_dir: platform::default_music_dir(),
            extensions: default_extensions(),
            page_size: default_page_size(),
        }
    }
}

impl EngineConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl PlayerConfig {
    /// Target time per frame; fps is clamped to 1..=120.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps.clamp(1, 120) as f64)
    }

    pub fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.status_ttl_secs)
    }
}

fn default_startup_timeout_ms() -> u64 {
    5000
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_volume() -> f64 {
    50.0
}

fn default_volume_step() -> f64 {
    5.0
}

fn default_target_fps() -> u32 {
    30
}

fn default_status_ttl_secs() -> u64 {
    3
}

fn default_theme() -> String {
    "lain".to_string()
}

fn default_extensions() -> Vec<String> {
    ["mp3", "wav", "ogg", "flac", "m4a", "wma", "aac", "opus"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_page_size() -> usize {
    20
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.player.default_volume, 50.0);
        assert_eq!(config.player.target_fps, 30);
        assert_eq!(config.player.status_ttl(), Duration::from_secs(3));
        assert!(config.engine.binary.is_none());
        assert!(config.library.extensions.iter().any(|e| e == "flac"));
        assert!(Config::config_path().ends_with("deck/config.toml"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [player]
            target_fps = 60
            theme = "matrix"

            [engine]
            binary = "/opt/mpv/bin/mpv"
            "#,
        )
        .unwrap();
        assert_eq!(config.player.target_fps, 60);
        assert_eq!(config.player.theme, "matrix");
        assert_eq!(config.player.volume_step, 5.0);
        assert_eq!(config.engine.connect_timeout_ms, 3000);
        assert_eq!(config.engine.binary, Some(PathBuf::from("/opt/mpv/bin/mpv")));
        assert_eq!(config.library.page_size, 20);
    }

    #[test]
    fn test_frame_interval_is_clamped() {
        let mut player = PlayerConfig::default();
        assert_eq!(player.frame_interval().as_millis(), 33);
        player.target_fps = 0;
        assert_eq!(player.frame_interval(), Duration::from_secs(1));
    }
}
