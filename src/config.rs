// Configuration module for plex-dream
// Handles XDG-compliant directory paths and TOML configuration file

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ambient::Regions;
use crate::engine::logo::DisplayMetrics;
use crate::engine::timeline::Timing;
use crate::engine::EngineConfig;
use crate::models::ArtworkSource;
use crate::services::resolver::BackdropSource;

const APP_NAME: &str = "plex-dream";
const CONFIG_FILENAME: &str = "config.toml";
const PREFS_FILENAME: &str = "prefs.toml";

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Plex account and library selection
    pub plex: PlexConfig,

    /// Supplemental artwork providers
    pub providers: ProvidersConfig,

    /// Rotation timing
    pub rotation: RotationConfig,

    /// Ambient gradient extraction
    pub ambient: AmbientConfig,

    /// Screen geometry used for logo sizing
    pub display: DisplayConfig,

    /// Directory paths (overrides XDG defaults)
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlexConfig {
    /// Plex auth token. When unset the stored token, or device linking, is used
    pub token: Option<String>,

    /// Client identifier of the server to use (default: first owned server)
    pub server_id: Option<String>,

    /// Library section ids to rotate through (default: every movie and show section)
    pub libraries: Vec<String>,

    /// Items requested per section (default: 300)
    pub batch_size: usize,

    /// Fixed X-Plex-Client-Identifier (default: generated and stored in prefs.toml)
    pub client_identifier: Option<String>,
}

impl Default for PlexConfig {
    fn default() -> Self {
        Self {
            token: None,
            server_id: None,
            libraries: Vec::new(),
            batch_size: 300,
            client_identifier: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// TMDB API key (optional, enables TMDB artwork)
    pub tmdb_api_key: Option<String>,

    /// Fanart.tv API key (optional, enables Fanart.tv artwork)
    pub fanart_api_key: Option<String>,

    /// Preferred logo language (default: "en")
    pub language: String,

    /// Order in which providers are asked for logos
    pub priority: Vec<ArtworkSource>,

    /// Backdrop fallback chain
    pub backdrop_order: Vec<BackdropSource>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            fanart_api_key: None,
            language: "en".to_string(),
            priority: vec![ArtworkSource::Fanart, ArtworkSource::Tmdb],
            backdrop_order: BackdropSource::default_order(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub interval_ms: u64,
    pub crossfade_ms: u64,
    pub logo_fade_out_ms: u64,
    pub logo_lead_ms: u64,
    pub logo_reveal_delay_ms: u64,
    pub logo_fade_in_ms: u64,
    /// Pan/zoom duration as a multiple of the interval
    pub pan_zoom_factor: f32,
}

impl Default for RotationConfig {
    fn default() -> Self {
        let timing = Timing::default();
        Self {
            interval_ms: timing.interval.as_millis() as u64,
            crossfade_ms: timing.crossfade.as_millis() as u64,
            logo_fade_out_ms: timing.logo_fade_out.as_millis() as u64,
            logo_lead_ms: timing.logo_lead.as_millis() as u64,
            logo_reveal_delay_ms: timing.logo_reveal_delay.as_millis() as u64,
            logo_fade_in_ms: timing.logo_fade_in.as_millis() as u64,
            pan_zoom_factor: timing.pan_zoom_factor,
        }
    }
}

impl RotationConfig {
    pub fn timing(&self) -> Timing {
        Timing {
            // A zero interval would spin the rotation loop
            interval: Duration::from_millis(self.interval_ms.max(1_000)),
            crossfade: Duration::from_millis(self.crossfade_ms),
            logo_fade_out: Duration::from_millis(self.logo_fade_out_ms),
            logo_lead: Duration::from_millis(self.logo_lead_ms),
            logo_reveal_delay: Duration::from_millis(self.logo_reveal_delay_ms),
            logo_fade_in: Duration::from_millis(self.logo_fade_in_ms),
            pan_zoom_factor: self.pan_zoom_factor,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    /// "single" for one color, "split" for left and right (default)
    pub regions: Regions,

    /// Side length of the downsampled image palettes are built from
    pub sample_size: u32,

    /// Gradient animation frame interval
    pub frame_interval_ms: u64,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            regions: Regions::default(),
            sample_size: 200,
            frame_interval_ms: 33,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub screen_width_dp: f32,
    pub screen_height_dp: f32,
    pub density: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        let metrics = DisplayMetrics::default();
        Self {
            screen_width_dp: metrics.width_dp,
            screen_height_dp: metrics.height_dp,
            density: metrics.density,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Override config directory (where prefs.toml is written)
    pub config_dir: Option<PathBuf>,
}

/// Application paths following XDG Base Directory Specification on Unix
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for config.toml and prefs.toml
    /// XDG: $XDG_CONFIG_HOME/plex-dream or ~/.config/plex-dream
    pub config_dir: PathBuf,
}

impl AppPaths {
    /// Priority order:
    /// 1. PLEX_DREAM_CONFIG_DIR
    /// 2. Config file override
    /// 3. XDG/platform config directory
    /// 4. Current directory fallback
    pub fn new(config_overrides: &PathsConfig) -> Self {
        let config_dir = std::env::var("PLEX_DREAM_CONFIG_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| config_overrides.config_dir.clone())
            .unwrap_or_else(default_config_dir);

        Self { config_dir }
    }

    /// Create application paths using current directory (portable mode)
    pub fn current_dir() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { config_dir: cwd }
    }

    pub fn config_file_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILENAME)
    }

    pub fn prefs_path(&self) -> PathBuf {
        self.config_dir.join(PREFS_FILENAME)
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.config_dir).await
    }

    pub fn log_paths(&self) {
        tracing::info!("Configuration directory: {}", self.config_dir.display());
        tracing::debug!("Config file: {}", self.config_file_path().display());
        tracing::debug!("Preferences file: {}", self.prefs_path().display());
    }
}

fn default_config_dir() -> PathBuf {
    if let Some(dir) = dirs::config_dir() {
        return dir.join(APP_NAME);
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Application configuration - combines TOML file with environment overrides
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub paths: AppPaths,

    pub plex_token: Option<String>,
    pub server_id: Option<String>,
    pub libraries: Vec<String>,
    pub batch_size: usize,
    pub client_identifier: Option<String>,

    pub tmdb_api_key: Option<String>,
    pub fanart_api_key: Option<String>,
    pub language: String,
    pub provider_priority: Vec<ArtworkSource>,
    pub backdrop_order: Vec<BackdropSource>,

    pub timing: Timing,
    pub ambient: AmbientConfig,
    pub display: DisplayMetrics,
}

impl AppConfig {
    /// Load configuration from TOML file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. TOML config file
    /// 3. Default values
    pub fn load() -> Self {
        let portable_mode = std::env::var("PLEX_DREAM_PORTABLE")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        if portable_mode {
            tracing::info!("Running in portable mode (using current directory)");
            let paths = AppPaths::current_dir();
            let config_file = load_config_file(&paths.config_dir);
            return Self::build_with(paths, config_file, env_var);
        }

        let config_dir = std::env::var("PLEX_DREAM_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_dir());
        let config_file = load_config_file(&config_dir);
        let paths = AppPaths::new(&config_file.paths);

        Self::build_with(paths, config_file, env_var)
    }

    /// Build configuration from a config file, with overrides looked up
    /// through `env`
    fn build_with(
        paths: AppPaths,
        config_file: ConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let ConfigFile {
            plex,
            providers,
            rotation,
            ambient,
            display,
            ..
        } = config_file;

        let mut timing = rotation.timing();
        // Interval: env > config > default
        if let Some(ms) = env("PLEX_DREAM_INTERVAL_MS").and_then(|v| v.parse::<u64>().ok()) {
            timing.interval = Duration::from_millis(ms.max(1_000));
        }

        let provider_priority = if providers.priority.is_empty() {
            ProvidersConfig::default().priority
        } else {
            providers.priority
        };
        let backdrop_order = if providers.backdrop_order.is_empty() {
            BackdropSource::default_order()
        } else {
            providers.backdrop_order
        };

        Self {
            paths,
            plex_token: env("PLEX_TOKEN").or(plex.token).filter(|t| !t.is_empty()),
            server_id: env("PLEX_SERVER_ID").or(plex.server_id),
            libraries: plex.libraries,
            batch_size: plex.batch_size.max(1),
            client_identifier: plex.client_identifier,
            tmdb_api_key: env("TMDB_API_KEY")
                .or(providers.tmdb_api_key)
                .filter(|k| !k.is_empty()),
            fanart_api_key: env("FANART_API_KEY")
                .or(providers.fanart_api_key)
                .filter(|k| !k.is_empty()),
            language: providers.language,
            provider_priority,
            backdrop_order,
            timing,
            ambient,
            display: DisplayMetrics {
                width_dp: display.screen_width_dp,
                height_dp: display.screen_height_dp,
                density: display.density,
            },
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            timing: self.timing,
            display: self.display,
            regions: self.ambient.regions,
            sample_size: self.ambient.sample_size,
            frame_interval: Duration::from_millis(self.ambient.frame_interval_ms.max(1)),
        }
    }

    /// Log configuration status
    pub fn log_config(&self) {
        self.paths.log_paths();

        let mut enabled = Vec::new();
        for source in &self.provider_priority {
            let configured = match source {
                ArtworkSource::Fanart => self.fanart_api_key.is_some(),
                ArtworkSource::Tmdb => self.tmdb_api_key.is_some(),
                ArtworkSource::Plex => false,
            };
            if configured {
                enabled.push(source.to_string());
            }
        }

        if enabled.is_empty() {
            tracing::info!("Artwork providers: Plex only");
            tracing::info!(
                "Hint: Add fanart_api_key or tmdb_api_key to config.toml (or set FANART_API_KEY / TMDB_API_KEY) for more logos"
            );
        } else {
            tracing::info!("Artwork providers: Plex + {}", enabled.join(" + "));
        }

        if let Some(ref server_id) = self.server_id {
            tracing::info!("Server: {}", server_id);
        }
        if !self.libraries.is_empty() {
            tracing::info!("Libraries: {}", self.libraries.join(", "));
        }

        tracing::debug!(
            "Rotation: every {:?}, crossfade {:?}, {} ambient region(s)",
            self.timing.interval,
            self.timing.crossfade,
            self.ambient.regions.count()
        );
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Load and parse the TOML config file
fn load_config_file(config_dir: &Path) -> ConfigFile {
    let config_path = config_dir.join(CONFIG_FILENAME);

    if !config_path.exists() {
        tracing::debug!(
            "No config file found at {}, using defaults",
            config_path.display()
        );
        return ConfigFile::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", config_path.display());
                config
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config file {}: {}. Using defaults.",
                    config_path.display(),
                    e
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                "Failed to read config file {}: {}. Using defaults.",
                config_path.display(),
                e
            );
            ConfigFile::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn paths() -> AppPaths {
        AppPaths {
            config_dir: PathBuf::from("/tmp/plex-dream"),
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_config_file() {
        let config = ConfigFile::default();
        assert_eq!(config.plex.batch_size, 300);
        assert!(config.plex.token.is_none());
        assert_eq!(config.providers.language, "en");
        assert_eq!(
            config.providers.priority,
            vec![ArtworkSource::Fanart, ArtworkSource::Tmdb]
        );
        assert_eq!(config.rotation.timing(), Timing::default());
        assert_eq!(config.ambient.regions, Regions::Split);
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
[plex]
token = "plex-token"
server_id = "abc123"
libraries = ["1", "4"]
batch_size = 100

[providers]
tmdb_api_key = "tmdb_key"
language = "de"
priority = ["tmdb", "fanart"]
backdrop_order = ["plex_art", "tmdb"]

[rotation]
interval_ms = 15000
crossfade_ms = 1500

[ambient]
regions = "single"

[display]
screen_width_dp = 1280.0
"#;
        let config: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(config.plex.token.as_deref(), Some("plex-token"));
        assert_eq!(config.plex.libraries, vec!["1", "4"]);
        assert_eq!(config.plex.batch_size, 100);
        assert_eq!(
            config.providers.priority,
            vec![ArtworkSource::Tmdb, ArtworkSource::Fanart]
        );
        assert_eq!(
            config.providers.backdrop_order,
            vec![BackdropSource::PlexArt, BackdropSource::Tmdb]
        );
        assert_eq!(config.ambient.regions, Regions::Single);
        assert_eq!(config.display.screen_width_dp, 1280.0);
        assert_eq!(config.display.density, 2.0);

        let timing = config.rotation.timing();
        assert_eq!(timing.interval, Duration::from_millis(15_000));
        assert_eq!(timing.crossfade, Duration::from_millis(1_500));
        // Unspecified keys keep their defaults
        assert_eq!(timing.logo_fade_out, Duration::from_millis(500));
    }

    #[test]
    fn test_partial_config_toml() {
        let toml_str = r#"
[providers]
fanart_api_key = "fanart_key"
"#;
        let config: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(config.plex.batch_size, 300);
        assert_eq!(config.providers.fanart_api_key.as_deref(), Some("fanart_key"));
        assert_eq!(config.providers.language, "en");
    }

    #[test]
    fn test_env_overrides_file() {
        let config: ConfigFile = toml::from_str(
            r#"
[plex]
token = "from-file"

[providers]
tmdb_api_key = "file-tmdb"
"#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("PLEX_TOKEN", "from-env"),
            ("FANART_API_KEY", "env-fanart"),
            ("PLEX_DREAM_INTERVAL_MS", "20000"),
        ]);
        let app = AppConfig::build_with(paths(), config, |name| {
            env.get(name).map(|v| v.to_string())
        });

        assert_eq!(app.plex_token.as_deref(), Some("from-env"));
        assert_eq!(app.tmdb_api_key.as_deref(), Some("file-tmdb"));
        assert_eq!(app.fanart_api_key.as_deref(), Some("env-fanart"));
        assert_eq!(app.timing.interval, Duration::from_millis(20_000));
    }

    #[test]
    fn test_empty_values_fall_back() {
        let config: ConfigFile = toml::from_str(
            r#"
[plex]
token = ""
batch_size = 0

[providers]
tmdb_api_key = ""
priority = []
backdrop_order = []

[rotation]
interval_ms = 0
"#,
        )
        .unwrap();
        let app = AppConfig::build_with(paths(), config, no_env);

        assert!(app.plex_token.is_none());
        assert!(app.tmdb_api_key.is_none());
        assert_eq!(app.batch_size, 1);
        assert_eq!(
            app.provider_priority,
            vec![ArtworkSource::Fanart, ArtworkSource::Tmdb]
        );
        assert_eq!(app.backdrop_order, BackdropSource::default_order());
        assert_eq!(app.timing.interval, Duration::from_millis(1_000));
    }

    #[test]
    fn test_engine_config() {
        let app = AppConfig::build_with(paths(), ConfigFile::default(), no_env);
        let engine = app.engine_config();
        assert_eq!(engine.timing, Timing::default());
        assert_eq!(engine.display, DisplayMetrics::default());
        assert_eq!(engine.sample_size, 200);
        assert_eq!(engine.frame_interval, Duration::from_millis(33));
    }

    #[test]
    fn test_paths() {
        let paths = paths();
        assert_eq!(
            paths.config_file_path(),
            PathBuf::from("/tmp/plex-dream/config.toml")
        );
        assert_eq!(paths.prefs_path(), PathBuf::from("/tmp/plex-dream/prefs.toml"));
    }
}
