use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;

use crate::ai::{article_summary_prompt, TextGenerator};
use crate::db::ArticleStore;
use crate::error::{AppError, Result};
use crate::models::{Article, SummaryTarget};

pub const DEFAULT_CONCURRENCY_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SummaryRunResult {
    pub processed_articles: usize,
    pub successful_articles: usize,
    pub failed_articles: usize,
    pub elapsed: Duration,
}

/// Generates per-article summaries for articles that have none yet.
///
/// Articles are processed in chunks of `concurrency_limit`: every call in a
/// chunk is in flight together, and the next chunk starts only once all of
/// them have settled. A failing article is logged and counted, never fatal.
pub struct ArticleSummarizer {
    store: Arc<dyn ArticleStore>,
    generator: Arc<dyn TextGenerator>,
    concurrency_limit: usize,
}

impl ArticleSummarizer {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        generator: Arc<dyn TextGenerator>,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            store,
            generator,
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    pub async fn execute(&self, target: SummaryTarget) -> Result<SummaryRunResult> {
        let started = Instant::now();
        tracing::info!("Article summarization started for {}", target);

        let articles = self.store.find_unsummarized(target).await.map_err(|e| {
            tracing::error!("Failed to fetch unsummarized articles for {}: {}", target, e);
            AppError::CandidateFetch {
                target: target.to_string(),
                source: Box::new(e),
            }
        })?;

        if articles.is_empty() {
            tracing::info!("No articles to summarize for {}", target);
            return Ok(SummaryRunResult {
                elapsed: started.elapsed(),
                ..Default::default()
            });
        }

        tracing::info!(
            "Summarizing {} articles, {} at a time",
            articles.len(),
            self.concurrency_limit
        );

        let mut successful_articles = 0;
        let mut failed_articles = 0;

        for chunk in articles.chunks(self.concurrency_limit) {
            let outcomes = join_all(chunk.iter().map(|article| self.summarize_article(article))).await;
            for ok in outcomes {
                if ok {
                    successful_articles += 1;
                } else {
                    failed_articles += 1;
                }
            }
        }

        let result = SummaryRunResult {
            processed_articles: articles.len(),
            successful_articles,
            failed_articles,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            "Article summarization finished in {:?}: {} succeeded, {} failed",
            result.elapsed,
            result.successful_articles,
            result.failed_articles
        );

        Ok(result)
    }

    async fn summarize_article(&self, article: &Article) -> bool {
        tracing::debug!("Summarizing article {} ({})", article.id, article.url);
        let prompt = article_summary_prompt(&article.url);

        let text = match self.generator.generate(&prompt).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::warn!("Empty summary returned for article {}", article.id);
                return false;
            }
            Err(e) => {
                tracing::error!("Summary generation failed for article {}: {}", article.id, e);
                return false;
            }
        };

        match self
            .store
            .upsert_summary(article.id, &text, self.generator.model_version())
            .await
        {
            Ok(()) => {
                tracing::debug!("Saved summary for article {}", article.id);
                true
            }
            Err(e) => {
                tracing::error!("Failed to save summary for article {}: {}", article.id, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::db::testing::{seed, FailingStore, StoreOp};
    use crate::db::SqliteStore;
    use crate::models::NewArticle;

    /// Tracks how many calls are in flight at once.
    struct CountingGenerator {
        in_flight: AtomicUsize,
        high_water: AtomicUsize,
        calls: AtomicUsize,
        fail_urls: Vec<String>,
        empty_urls: Vec<String>,
        seen: Mutex<Vec<String>>,
    }

    impl CountingGenerator {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                high_water: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                fail_urls: Vec::new(),
                empty_urls: Vec::new(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn generate(&self, prompt: &str) -> Result<Option<String>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(now, Ordering::SeqCst);
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(5)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(prompt.to_string());

            if self.fail_urls.iter().any(|u| prompt.contains(u.as_str())) {
                return Err(AppError::GenerationApi("boom".to_string()));
            }
            if self.empty_urls.iter().any(|u| prompt.contains(u.as_str())) {
                return Ok(None);
            }
            Ok(Some(format!("Summary-{}", n)))
        }

        fn model_version(&self) -> &str {
            "counting"
        }
    }

    async fn seeded_store(urls: &[&str]) -> (Arc<SqliteStore>, i64, Vec<i64>) {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let user = store.create_user("u", "User").await.unwrap();
        let mut ids = Vec::new();
        for url in urls {
            let article = store
                .save_article(NewArticle::validate(user.id, url, None).unwrap())
                .await
                .unwrap();
            ids.push(article.id);
        }
        (Arc::new(store), user.id, ids)
    }

    #[tokio::test]
    async fn summarizes_every_unsummarized_article() {
        let (store, user_id, ids) = seeded_store(&[
            "https://example.com/1",
            "https://example.com/2",
            "https://example.com/3",
        ])
        .await;
        let generator = Arc::new(CountingGenerator::new());
        let summarizer = ArticleSummarizer::new(store.clone(), generator, 3);

        let result = summarizer.execute(SummaryTarget::User(user_id)).await.unwrap();
        assert_eq!(result.processed_articles, 3);
        assert_eq!(result.successful_articles, 3);
        assert_eq!(result.failed_articles, 0);

        for id in ids {
            let summary = store.get_summary(id).await.unwrap().unwrap();
            assert!(summary.content.starts_with("Summary-"));
            assert_eq!(summary.model_version, "counting");
        }
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let (store, user_id, _) =
            seeded_store(&["https://example.com/1", "https://example.com/2"]).await;
        let generator = Arc::new(CountingGenerator::new());
        let summarizer = ArticleSummarizer::new(store, generator.clone(), 3);

        summarizer.execute(SummaryTarget::User(user_id)).await.unwrap();
        let calls_after_first = generator.calls.load(Ordering::SeqCst);

        let second = summarizer.execute(SummaryTarget::AllUsers).await.unwrap();
        assert_eq!(second, SummaryRunResult { elapsed: second.elapsed, ..Default::default() });
        assert_eq!(generator.calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn in_flight_calls_never_exceed_limit() {
        let urls: Vec<String> = (0..10).map(|i| format!("https://example.com/{}", i)).collect();
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let (store, user_id, _) = seeded_store(&refs).await;
        let generator = Arc::new(CountingGenerator::new());
        let summarizer = ArticleSummarizer::new(store, generator.clone(), 3);

        let result = summarizer.execute(SummaryTarget::User(user_id)).await.unwrap();
        assert_eq!(result.successful_articles, 10);
        assert_eq!(generator.high_water.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failures_are_counted_not_fatal() {
        let (store, user_id, ids) = seeded_store(&[
            "https://example.com/ok",
            "https://example.com/err",
            "https://example.com/empty",
            "https://example.com/ok2",
        ])
        .await;
        let mut generator = CountingGenerator::new();
        generator.fail_urls.push("https://example.com/err".to_string());
        generator.empty_urls.push("https://example.com/empty".to_string());
        let summarizer = ArticleSummarizer::new(store.clone(), Arc::new(generator), 2);

        let result = summarizer.execute(SummaryTarget::User(user_id)).await.unwrap();
        assert_eq!(result.processed_articles, 4);
        assert_eq!(result.successful_articles, 2);
        assert_eq!(result.failed_articles, 2);

        assert!(store.get_summary(ids[1]).await.unwrap().is_none());
        assert!(store.get_summary(ids[2]).await.unwrap().is_none());

        // The failed articles are picked up again next time
        let remaining = store.find_unsummarized(SummaryTarget::User(user_id)).await.unwrap();
        assert_eq!(remaining.len(), 2);
    }

    #[tokio::test]
    async fn zero_limit_is_clamped() {
        let (store, user_id, _) = seeded_store(&["https://example.com/1"]).await;
        let summarizer = ArticleSummarizer::new(store, Arc::new(CountingGenerator::new()), 0);
        let result = summarizer.execute(SummaryTarget::User(user_id)).await.unwrap();
        assert_eq!(result.successful_articles, 1);
    }

    #[tokio::test]
    async fn candidate_fetch_failure_is_reported() {
        let store = FailingStore::new().await.fail(StoreOp::FindUnsummarized);
        let (user_id, _) = seed(&store, "u", &["https://example.com/1"]).await;
        let generator = Arc::new(CountingGenerator::new());
        let summarizer = ArticleSummarizer::new(Arc::new(store), generator.clone(), 3);

        let err = summarizer.execute(SummaryTarget::User(user_id)).await.unwrap_err();
        let AppError::CandidateFetch { target, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(target, &format!("user {}", user_id));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_save_counts_against_one_article() {
        let store = FailingStore::new().await;
        let (user_id, ids) = seed(
            &store,
            "u",
            &[
                "https://example.com/1",
                "https://example.com/2",
                "https://example.com/3",
            ],
        )
        .await;
        let store = Arc::new(store.fail_summary_for(ids[1]));
        let summarizer =
            ArticleSummarizer::new(store.clone(), Arc::new(CountingGenerator::new()), 3);

        let result = summarizer.execute(SummaryTarget::User(user_id)).await.unwrap();
        assert_eq!(result.processed_articles, 3);
        assert_eq!(result.successful_articles, 2);
        assert_eq!(result.failed_articles, 1);

        let inner = store.inner();
        assert!(inner.get_summary(ids[0]).await.unwrap().is_some());
        assert!(inner.get_summary(ids[1]).await.unwrap().is_none());
        assert!(inner.get_summary(ids[2]).await.unwrap().is_some());
    }
}
