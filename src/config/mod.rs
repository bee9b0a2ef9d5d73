use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the shared request secret.
pub const SECRET_ENV: &str = "MEDIA_PROCESSOR_SECRET";

/// Environment variable holding the backend API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Artifact storage settings
    pub storage: StorageConfig,

    /// Speech/text backend settings
    pub backend: BackendConfig,

    /// External tool settings
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Allowed CORS origins (credentials are always allowed for these)
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding the `uploads/` and `outputs/` namespaces
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the OpenAI-compatible API
    pub api_base: String,

    /// Speech-to-text model
    pub transcription_model: String,

    /// Chat model used for summaries
    pub summary_model: String,

    /// Text-to-speech model
    pub speech_model: String,

    /// Voice used for synthesis
    pub speech_voice: String,

    /// Language used when detection fails or is inconclusive
    pub fallback_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the ffmpeg binary
    pub ffmpeg_path: String,

    /// Path to the yt-dlp binary
    pub yt_dlp_path: String,

    /// Default tempo factor for the fast-audio stages
    pub tempo_factor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                cors_origins: vec![
                    "http://localhost:5173".to_string(),
                    "http://localhost:3000".to_string(),
                ],
            },
            storage: StorageConfig {
                root: PathBuf::from("data"),
            },
            backend: BackendConfig {
                api_base: "https://api.openai.com/v1".to_string(),
                transcription_model: "whisper-1".to_string(),
                summary_model: "gpt-4o-mini".to_string(),
                speech_model: "tts-1".to_string(),
                speech_voice: "alloy".to_string(),
                fallback_language: "en".to_string(),
            },
            tools: ToolsConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                yt_dlp_path: "yt-dlp".to_string(),
                tempo_factor: 1.5,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("media-processor").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // ffmpeg rejects atempo outside 0.5..=100.0
        if !(0.5..=100.0).contains(&self.tools.tempo_factor) {
            anyhow::bail!(
                "tempo_factor must be within 0.5..=100.0 (got {})",
                self.tools.tempo_factor
            );
        }

        if self.backend.api_base.is_empty() {
            anyhow::bail!("backend api_base must not be empty");
        }

        Ok(())
    }

    /// Shared request secret, taken from the environment only.
    pub fn shared_secret(&self) -> Option<String> {
        std::env::var(SECRET_ENV).ok().filter(|s| !s.is_empty())
    }

    /// Backend API key, taken from the environment only.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV).ok().filter(|s| !s.is_empty())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen: {}:{}", self.server.host, self.server.port);
        println!("  Storage Root: {}", self.storage.root.display());
        println!("  Backend: {}", self.backend.api_base);
        println!(
            "  Models: {} / {} / {}",
            self.backend.transcription_model,
            self.backend.summary_model,
            self.backend.speech_model
        );
        println!("  Tempo Factor: {}", self.tools.tempo_factor);
        println!("  CORS Origins: {}", self.server.cors_origins.join(", "));
    }
}
