use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ai::{GEMINI_API_URL, GEMINI_TEXT_MODEL};
use crate::error::{AppError, Result};
use crate::services::{DEFAULT_CONCURRENCY_LIMIT, DEFAULT_DIGEST_ARTICLE_LIMIT, DEFAULT_USER_CHUNK_SIZE};
use crate::speech::GEMINI_TTS_MODEL;

const APP_DIR: &str = "readlater-digest";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_audio_dir")]
    pub audio_dir: String,

    pub gemini_api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub gemini_base_url: String,

    #[serde(default = "default_text_model")]
    pub text_model: String,

    #[serde(default = "default_speech_model")]
    pub speech_model: String,

    #[serde(default = "default_voices")]
    pub speaker_voices: [String; 2],

    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    #[serde(default = "default_digest_article_limit")]
    pub digest_article_limit: usize,

    #[serde(default = "default_user_chunk_size")]
    pub user_chunk_size: usize,

    /// Restricts the summarizer to one user; all users when unset.
    #[serde(default)]
    pub target_user: Option<i64>,

    #[serde(default)]
    pub use_mock_generation: bool,

    #[serde(default)]
    pub use_mock_speech: bool,
}

fn data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir
}

fn default_db_path() -> String {
    data_dir().join("digest.db").to_string_lossy().to_string()
}

fn default_audio_dir() -> String {
    data_dir().join("storage").to_string_lossy().to_string()
}

fn default_base_url() -> String {
    GEMINI_API_URL.to_string()
}

fn default_text_model() -> String {
    GEMINI_TEXT_MODEL.to_string()
}

fn default_speech_model() -> String {
    GEMINI_TTS_MODEL.to_string()
}

fn default_voices() -> [String; 2] {
    ["Zephyr".to_string(), "Puck".to_string()]
}

fn default_concurrency_limit() -> usize {
    DEFAULT_CONCURRENCY_LIMIT
}

fn default_digest_article_limit() -> usize {
    DEFAULT_DIGEST_ARTICLE_LIMIT
}

fn default_user_chunk_size() -> usize {
    DEFAULT_USER_CHUNK_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            audio_dir: default_audio_dir(),
            gemini_api_key: None,
            gemini_base_url: default_base_url(),
            text_model: default_text_model(),
            speech_model: default_speech_model(),
            speaker_voices: default_voices(),
            concurrency_limit: default_concurrency_limit(),
            digest_article_limit: default_digest_article_limit(),
            user_chunk_size: default_user_chunk_size(),
            target_user: None,
            use_mock_generation: false,
            use_mock_speech: false,
        }
    }
}

impl Config {
    /// Loads the user config file (writing defaults on first run), then
    /// applies environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Environment variables win over the file.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = var("GEMINI_API_KEY").filter(|k| !k.is_empty()) {
            self.gemini_api_key = Some(key);
        }
        if let Some(flag) = var("USE_MOCK_SUMMARY_AI") {
            self.use_mock_generation = flag == "true";
        }
        if let Some(flag) = var("USE_MOCK_TTS") {
            self.use_mock_speech = flag == "true";
        }
        if let Some(raw) = var("BATCH_USER_ID") {
            let user_id = raw
                .parse()
                .map_err(|_| AppError::Config(format!("BATCH_USER_ID is not a number: {}", raw)))?;
            self.target_user = Some(user_id);
        }
        if let Some(raw) = var("BATCH_CONCURRENCY_LIMIT") {
            self.concurrency_limit = raw.parse().map_err(|_| {
                AppError::Config(format!("BATCH_CONCURRENCY_LIMIT is not a number: {}", raw))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency_limit == 0 {
            return Err(AppError::Config("concurrency_limit must be at least 1".to_string()));
        }
        if self.digest_article_limit == 0 {
            return Err(AppError::Config("digest_article_limit must be at least 1".to_string()));
        }
        if self.user_chunk_size == 0 {
            return Err(AppError::Config("user_chunk_size must be at least 1".to_string()));
        }
        let needs_key = !self.use_mock_generation || !self.use_mock_speech;
        if needs_key && self.gemini_api_key.as_deref().unwrap_or("").is_empty() {
            return Err(AppError::Config(
                "gemini_api_key is required unless both mock modes are enabled".to_string(),
            ));
        }
        Ok(())
    }
}
