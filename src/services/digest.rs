use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::ai::{daily_digest_prompt, talk_script_prompt, TextGenerator};
use crate::db::ArticleStore;
use crate::error::{AppError, Result};
use crate::models::{Article, NewDigest};
use crate::speech::SpeechSynthesizer;

pub const DEFAULT_DIGEST_ARTICLE_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestRequest {
    pub user_id: i64,
    /// Defaults to today's local date.
    pub target_date: Option<NaiveDate>,
}

impl DigestRequest {
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id,
            target_date: None,
        }
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.target_date = Some(date);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DigestOutcome {
    pub processed_articles: usize,
    pub digest_id: Option<i64>,
    pub audio_locator: Option<String>,
    pub daily_summary_generated: bool,
    pub elapsed: Duration,
}

/// Builds one user's daily digest: combined text, then a two-speaker audio
/// rendition.
///
/// The digest row (text plus article links) is committed before any audio
/// work starts, so it is readable with a null audio locator while speech is
/// still being produced.
pub struct DailyDigestBuilder {
    store: Arc<dyn ArticleStore>,
    generator: Arc<dyn TextGenerator>,
    speech: Arc<dyn SpeechSynthesizer>,
    article_limit: usize,
}

impl DailyDigestBuilder {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        generator: Arc<dyn TextGenerator>,
        speech: Arc<dyn SpeechSynthesizer>,
        article_limit: usize,
    ) -> Self {
        Self {
            store,
            generator,
            speech,
            article_limit: article_limit.max(1),
        }
    }

    pub async fn execute(&self, request: DigestRequest) -> Result<DigestOutcome> {
        let started = Instant::now();
        let user_id = request.user_id;
        let date = request
            .target_date
            .unwrap_or_else(|| Local::now().date_naive());
        tracing::info!("Daily digest started for user {} on {}", user_id, date);

        let existing = self
            .store
            .find_digest(user_id, date)
            .await
            .map_err(|e| candidate_error(user_id, e))?;
        if let Some(existing) = existing {
            tracing::info!(
                "Digest {} already exists for user {} on {}, skipping",
                existing.id,
                user_id,
                date
            );
            return Ok(DigestOutcome {
                digest_id: Some(existing.id),
                audio_locator: existing.audio_locator,
                elapsed: started.elapsed(),
                ..Default::default()
            });
        }

        let articles = self
            .store
            .find_undigested(user_id, self.article_limit)
            .await
            .map_err(|e| candidate_error(user_id, e))?;
        if articles.is_empty() {
            tracing::info!("No undigested articles for user {}", user_id);
            return Ok(DigestOutcome {
                elapsed: started.elapsed(),
                ..Default::default()
            });
        }

        let urls: Vec<String> = articles.iter().map(|a| a.url.clone()).collect();
        tracing::info!("Building digest from {} articles for user {}", urls.len(), user_id);

        let summary = self
            .generate_text(user_id, "daily digest", &daily_digest_prompt(&urls))
            .await?;

        let digest_id = self
            .store
            .create_digest_with_links(NewDigest {
                user_id,
                generated_date: date,
                summary,
                article_ids: articles.iter().map(|a| a.id).collect(),
            })
            .await
            .map_err(|e| {
                tracing::error!("Failed to save digest for user {}: {}", user_id, e);
                AppError::Persistence {
                    user_id,
                    source: Box::new(e),
                }
            })?;
        tracing::info!("Saved digest {} for user {} (audio pending)", digest_id, user_id);

        let audio_locator = self
            .produce_audio(user_id, digest_id, &articles)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Audio generation failed for digest {} (user {}): {}",
                    digest_id,
                    user_id,
                    e
                );
                AppError::SpeechGeneration {
                    user_id,
                    digest_id,
                    source: Box::new(e),
                }
            })?;

        let outcome = DigestOutcome {
            processed_articles: articles.len(),
            digest_id: Some(digest_id),
            audio_locator,
            daily_summary_generated: true,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            "Daily digest finished for user {} in {:?}",
            user_id,
            outcome.elapsed
        );
        Ok(outcome)
    }

    async fn generate_text(&self, user_id: i64, stage: &'static str, prompt: &str) -> Result<String> {
        match self.generator.generate(prompt).await {
            Ok(Some(text)) => Ok(text),
            Ok(None) => {
                tracing::error!("Empty {} text for user {}", stage, user_id);
                Err(AppError::TextGeneration { user_id, stage })
            }
            Err(e) => {
                tracing::error!("Generating {} for user {} failed: {}", stage, user_id, e);
                Err(AppError::TextGeneration { user_id, stage })
            }
        }
    }

    /// Talk script, speech, then the audio locator update. Only the first
    /// artifact is referenced from the digest; the rest stay in storage.
    async fn produce_audio(
        &self,
        user_id: i64,
        digest_id: i64,
        articles: &[Article],
    ) -> Result<Option<String>> {
        let urls: Vec<String> = articles.iter().map(|a| a.url.clone()).collect();
        let script = self
            .generate_text(user_id, "talk script", &talk_script_prompt(&urls))
            .await?;

        let identifier = artifact_identifier();
        let locators = self.speech.synthesize(&script, &identifier, user_id).await?;
        tracing::info!(
            "Speech produced {} artifacts for digest {}",
            locators.len(),
            digest_id
        );

        let Some(locator) = locators.into_iter().next() else {
            tracing::warn!("No audio produced for digest {}", digest_id);
            return Ok(None);
        };

        self.store.update_digest_audio(digest_id, &locator).await?;
        Ok(Some(locator))
    }
}

fn candidate_error(user_id: i64, e: AppError) -> AppError {
    tracing::error!("Failed to load digest inputs for user {}: {}", user_id, e);
    AppError::CandidateFetch {
        target: format!("user {}", user_id),
        source: Box::new(e),
    }
}

/// `YYYYMMDDHHMMSS_<random>`, unique enough to name one speech run.
pub fn artifact_identifier() -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect::<String>()
        .to_ascii_lowercase();
    format!("{}_{}", timestamp, suffix)
}
