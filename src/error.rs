use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("generation API error: {0}")]
    GenerationApi(String),

    #[error("speech API error: {0}")]
    SpeechApi(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to fetch candidate articles for {target}")]
    CandidateFetch {
        target: String,
        #[source]
        source: Box<AppError>,
    },

    #[error("text generation failed for user {user_id} during {stage}")]
    TextGeneration { user_id: i64, stage: &'static str },

    #[error("failed to persist daily digest for user {user_id}")]
    Persistence {
        user_id: i64,
        #[source]
        source: Box<AppError>,
    },

    #[error("speech generation failed for user {user_id} (digest {digest_id} saved without audio)")]
    SpeechGeneration {
        user_id: i64,
        digest_id: i64,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// True when a digest row was committed before the failure, so the caller
    /// should treat the run as a partial success.
    pub fn is_partial_digest(&self) -> bool {
        matches!(self, AppError::SpeechGeneration { .. })
    }
}
