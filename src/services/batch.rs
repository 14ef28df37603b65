use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};

use crate::db::ArticleStore;
use crate::error::Result;

use super::digest::{DailyDigestBuilder, DigestRequest};

pub const DEFAULT_USER_CHUNK_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFailure {
    pub user_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub eligible_users: usize,
    pub succeeded: usize,
    /// Digest saved but its audio could not be produced.
    pub partial: usize,
    pub failed: usize,
    pub failures: Vec<UserFailure>,
    pub elapsed: Duration,
}

/// Runs the daily digest for every user with undigested articles.
///
/// Users are handled one at a time; chunks only group progress logging. One
/// user's error is recorded and the run moves on to the next user.
pub struct BatchDriver {
    store: Arc<dyn ArticleStore>,
    builder: DailyDigestBuilder,
    chunk_size: usize,
    target_date: Option<NaiveDate>,
}

impl BatchDriver {
    pub fn new(store: Arc<dyn ArticleStore>, builder: DailyDigestBuilder, chunk_size: usize) -> Self {
        Self {
            store,
            builder,
            chunk_size: chunk_size.max(1),
            target_date: None,
        }
    }

    /// Pins the digest date instead of using today's date at run start.
    pub fn with_target_date(mut self, date: NaiveDate) -> Self {
        self.target_date = Some(date);
        self
    }

    pub fn builder(&self) -> &DailyDigestBuilder {
        &self.builder
    }

    pub async fn run(&self) -> Result<BatchReport> {
        let started = Instant::now();
        // Resolved once so a run crossing midnight files every digest under one date
        let date = self
            .target_date
            .unwrap_or_else(|| Local::now().date_naive());

        let users = self.store.users_with_undigested().await.map_err(|e| {
            tracing::error!("Failed to load users for the digest batch: {}", e);
            e
        })?;

        if users.is_empty() {
            tracing::info!("No users with undigested articles");
            return Ok(BatchReport {
                elapsed: started.elapsed(),
                ..Default::default()
            });
        }

        tracing::info!(
            "Processing {} users in chunks of {}",
            users.len(),
            self.chunk_size
        );

        let mut report = BatchReport {
            eligible_users: users.len(),
            ..Default::default()
        };

        for (chunk_index, chunk) in users.chunks(self.chunk_size).enumerate() {
            let first = chunk_index * self.chunk_size + 1;
            tracing::info!(
                "Chunk {} started (users {} to {})",
                chunk_index + 1,
                first,
                first + chunk.len() - 1
            );

            let mut chunk_succeeded = 0;
            let mut chunk_failed = 0;

            for &user_id in chunk {
                match self
                    .builder
                    .execute(DigestRequest::for_user(user_id).on(date))
                    .await
                {
                    Ok(outcome) => {
                        tracing::info!(
                            "User {}: {} articles, digest generated: {}, audio: {}",
                            user_id,
                            outcome.processed_articles,
                            outcome.daily_summary_generated,
                            outcome.audio_locator.as_deref().unwrap_or("none")
                        );
                        report.succeeded += 1;
                        chunk_succeeded += 1;
                    }
                    Err(e) if e.is_partial_digest() => {
                        tracing::warn!("User {}: digest saved without audio: {}", user_id, e);
                        report.partial += 1;
                        report.failures.push(UserFailure {
                            user_id,
                            error: e.to_string(),
                        });
                        chunk_failed += 1;
                    }
                    Err(e) => {
                        tracing::error!("User {}: digest failed: {}", user_id, e);
                        report.failed += 1;
                        report.failures.push(UserFailure {
                            user_id,
                            error: e.to_string(),
                        });
                        chunk_failed += 1;
                    }
                }
            }

            tracing::info!(
                "Chunk {} finished: {} succeeded, {} failed",
                chunk_index + 1,
                chunk_succeeded,
                chunk_failed
            );
        }

        report.elapsed = started.elapsed();
        tracing::info!(
            "Digest batch finished in {:?}: {} succeeded, {} partial, {} failed",
            report.elapsed,
            report.succeeded,
            report.partial,
            report.failed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::ai::{FakeTextGenerator, TextGenerator};
    use crate::db::testing::{seed, FailingStore, StoreOp};
    use crate::db::SqliteStore;
    use crate::error::AppError;
    use crate::models::NewArticle;
    use crate::speech::{FakeSpeechSynthesizer, LocalAudioStorage};

    /// Fails for prompts mentioning `poison`, and records the order users were served.
    struct PoisonGenerator {
        poison: String,
        in_flight: AtomicUsize,
        high_water: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for PoisonGenerator {
        async fn generate(&self, prompt: &str) -> crate::error::Result<Option<String>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.prompts.lock().unwrap().push(prompt.to_string());
            if prompt.contains(&self.poison) {
                return Err(AppError::GenerationApi("provider rejected prompt".to_string()));
            }
            FakeTextGenerator.generate(prompt).await
        }

        fn model_version(&self) -> &str {
            "poison"
        }
    }

    async fn seed_users(store: &SqliteStore, count: usize) -> Vec<i64> {
        let mut ids = Vec::new();
        for i in 0..count {
            let user = store
                .create_user(&format!("auth-{}", i), &format!("User {}", i))
                .await
                .unwrap();
            let url = format!("https://user{}.example.com/post", i);
            store
                .save_article(NewArticle::validate(user.id, &url, None).unwrap())
                .await
                .unwrap();
            ids.push(user.id);
        }
        ids
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[tokio::test]
    async fn one_failing_user_does_not_stop_the_batch() {
        let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
        let users = seed_users(&store, 5).await;
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalAudioStorage::new(dir.path()));

        let generator = Arc::new(PoisonGenerator {
            poison: "https://user2.example.com/post".to_string(),
            in_flight: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        });
        let builder = DailyDigestBuilder::new(
            store.clone(),
            generator.clone(),
            Arc::new(FakeSpeechSynthesizer::new(storage)),
            5,
        );
        let driver = BatchDriver::new(store.clone(), builder, 2).with_target_date(date());

        let report = driver.run().await.unwrap();
        assert_eq!(report.eligible_users, 5);
        assert_eq!(report.succeeded, 4);
        assert_eq!(report.failed, 1);
        assert_eq!(report.partial, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].user_id, users[2]);

        // Users after the failing one were still processed
        for &user_id in &users[3..] {
            assert!(store.find_digest(user_id, date()).await.unwrap().is_some());
        }
        assert!(store.find_digest(users[2], date()).await.unwrap().is_none());

        // Users are served one after another
        assert_eq!(generator.high_water.load(Ordering::SeqCst), 1);

        // Only the failed user is still eligible
        assert_eq!(store.users_with_undigested().await.unwrap(), vec![users[2]]);
    }

    #[tokio::test]
    async fn empty_store_reports_nothing() {
        let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
        let dir = tempfile::tempdir().unwrap();
        let builder = DailyDigestBuilder::new(
            store.clone(),
            Arc::new(FakeTextGenerator),
            Arc::new(FakeSpeechSynthesizer::new(Arc::new(LocalAudioStorage::new(
                dir.path(),
            )))),
            5,
        );
        let report = BatchDriver::new(store, builder, 10).run().await.unwrap();
        assert_eq!(report.eligible_users, 0);
        assert_eq!(report.succeeded + report.failed + report.partial, 0);
    }

    fn driver_over(store: Arc<FailingStore>, dir: &tempfile::TempDir) -> BatchDriver {
        let builder = DailyDigestBuilder::new(
            store.clone(),
            Arc::new(FakeTextGenerator),
            Arc::new(FakeSpeechSynthesizer::new(Arc::new(LocalAudioStorage::new(
                dir.path(),
            )))),
            5,
        );
        BatchDriver::new(store, builder, 10).with_target_date(date())
    }

    #[tokio::test]
    async fn failed_user_query_aborts_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = FailingStore::new().await.fail(StoreOp::UsersWithUndigested);
        let (user_id, _) = seed(&store, "u", &["https://example.com/1"]).await;
        let store = Arc::new(store);

        let err = driver_over(store.clone(), &dir).run().await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert!(store.inner().list_digests(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn digests_without_audio_count_as_partial() {
        let dir = tempfile::tempdir().unwrap();
        let store = FailingStore::new().await.fail(StoreOp::UpdateDigestAudio);
        let (first, _) = seed(&store, "a", &["https://a.example.com/1"]).await;
        let (second, _) = seed(&store, "b", &["https://b.example.com/1"]).await;
        let store = Arc::new(store);

        let report = driver_over(store.clone(), &dir).run().await.unwrap();
        assert_eq!(report.eligible_users, 2);
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.partial, 2);
        assert_eq!(report.failed, 0);
        let failed_users: Vec<i64> = report.failures.iter().map(|f| f.user_id).collect();
        assert_eq!(failed_users, vec![first, second]);

        // The text digests were kept, so nobody is eligible again
        for user_id in [first, second] {
            let digest = store.inner().find_digest(user_id, date()).await.unwrap().unwrap();
            assert!(digest.audio_locator.is_none());
        }
        assert!(store.inner().users_with_undigested().await.unwrap().is_empty());
    }
}
