use std::sync::Arc;

use crate::ai::{FakeTextGenerator, GeminiTextGenerator, TextGenerator};
use crate::config::Config;
use crate::db::{ArticleStore, SqliteStore};
use crate::error::{AppError, Result};
use crate::models::{Article, NewArticle, SummaryTarget, User};
use crate::services::{
    ArticleSummarizer, BatchDriver, BatchReport, DailyDigestBuilder, DigestOutcome, DigestRequest,
    SummaryRunResult,
};
use crate::speech::{
    AudioFileInfo, AudioStorage, FakeSpeechSynthesizer, GeminiSpeechSynthesizer,
    LocalAudioStorage, SpeechSynthesizer,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRunReport {
    pub summaries: SummaryRunResult,
    pub digests: BatchReport,
}

/// Composition root: owns the store handle and wires the pipeline together.
pub struct App {
    store: Arc<SqliteStore>,
    audio: Arc<dyn AudioStorage>,
    summarizer: ArticleSummarizer,
    batch: BatchDriver,
    summary_target: SummaryTarget,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(SqliteStore::open(&config.db_path).await?);
        let audio: Arc<dyn AudioStorage> = Arc::new(LocalAudioStorage::new(&config.audio_dir));

        let generator: Arc<dyn TextGenerator> = if config.use_mock_generation {
            tracing::info!("Text generation running in mock mode");
            Arc::new(FakeTextGenerator)
        } else {
            Arc::new(GeminiTextGenerator::new(
                api_key(config)?,
                config.gemini_base_url.clone(),
                config.text_model.clone(),
            )?)
        };

        let speech: Arc<dyn SpeechSynthesizer> = if config.use_mock_speech {
            tracing::info!("Speech generation running in mock mode");
            Arc::new(FakeSpeechSynthesizer::new(audio.clone()))
        } else {
            Arc::new(GeminiSpeechSynthesizer::new(
                api_key(config)?,
                config.gemini_base_url.clone(),
                config.speech_model.clone(),
                config.speaker_voices.clone(),
                audio.clone(),
            )?)
        };

        Ok(Self::assemble(store, audio, generator, speech, config))
    }

    /// Wires already constructed collaborators; used by [`App::new`] and tests.
    pub fn assemble(
        store: Arc<SqliteStore>,
        audio: Arc<dyn AudioStorage>,
        generator: Arc<dyn TextGenerator>,
        speech: Arc<dyn SpeechSynthesizer>,
        config: &Config,
    ) -> Self {
        let summarizer =
            ArticleSummarizer::new(store.clone(), generator.clone(), config.concurrency_limit);
        let builder =
            DailyDigestBuilder::new(store.clone(), generator, speech, config.digest_article_limit);
        let batch = BatchDriver::new(store.clone(), builder, config.user_chunk_size);

        let summary_target = config
            .target_user
            .map(SummaryTarget::User)
            .unwrap_or(SummaryTarget::AllUsers);

        Self {
            store,
            audio,
            summarizer,
            batch,
            summary_target,
        }
    }

    /// Summarizes pending articles, then builds digests for every eligible user.
    pub async fn run_batch(&self) -> Result<BatchRunReport> {
        let summaries = self.summarizer.execute(self.summary_target).await?;
        let digests = self.batch.run().await?;
        Ok(BatchRunReport { summaries, digests })
    }

    pub async fn summarize(&self, target: SummaryTarget) -> Result<SummaryRunResult> {
        self.summarizer.execute(target).await
    }

    pub async fn build_digest(&self, request: DigestRequest) -> Result<DigestOutcome> {
        self.batch.builder().execute(request).await
    }

    pub async fn add_user(&self, auth_id: &str, name: &str) -> Result<User> {
        if auth_id.trim().is_empty() {
            return Err(AppError::Validation("auth id is required".to_string()));
        }
        self.store.create_user(auth_id.trim(), name.trim()).await
    }

    pub async fn save_article(&self, user_id: i64, url: &str, title: Option<&str>) -> Result<Article> {
        let article = NewArticle::validate(user_id, url, title)?;
        self.store.save_article(article).await
    }

    pub async fn list_audio(&self, user_id: i64) -> Result<Vec<AudioFileInfo>> {
        self.audio.list_for_user(user_id).await
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Drops the pipeline and closes the store handle.
    pub async fn close(self) -> Result<()> {
        let Self {
            store,
            summarizer,
            batch,
            ..
        } = self;
        drop(summarizer);
        drop(batch);

        let store = Arc::try_unwrap(store)
            .map_err(|_| AppError::Storage("store handle still shared at close".to_string()))?;
        store.close().await
    }
}

fn api_key(config: &Config) -> Result<String> {
    config
        .gemini_api_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::Config("gemini_api_key is not set".to_string()))
}
