//! Store wrapper for tests that need individual operations to fail.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{ArticleStore, SqliteStore};
use crate::error::{AppError, Result};
use crate::models::{Article, DailyDigest, NewArticle, NewDigest, Summary, SummaryTarget, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum StoreOp {
    FindUnsummarized,
    UpsertSummary,
    FindUndigested,
    UsersWithUndigested,
    FindDigest,
    CreateDigest,
    UpdateDigestAudio,
}

/// Delegates to an in-memory [`SqliteStore`], except for the operations it
/// was told to break.
pub(crate) struct FailingStore {
    inner: SqliteStore,
    failing: HashSet<StoreOp>,
    failing_summaries: HashSet<i64>,
}

impl FailingStore {
    pub(crate) async fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory()
                .await
                .expect("in-memory store"),
            failing: HashSet::new(),
            failing_summaries: HashSet::new(),
        }
    }

    pub(crate) fn fail(mut self, op: StoreOp) -> Self {
        self.failing.insert(op);
        self
    }

    /// Breaks `upsert_summary` for one article only.
    pub(crate) fn fail_summary_for(mut self, article_id: i64) -> Self {
        self.failing_summaries.insert(article_id);
        self
    }

    pub(crate) fn inner(&self) -> &SqliteStore {
        &self.inner
    }

    fn check(&self, op: StoreOp) -> Result<()> {
        if self.failing.contains(&op) {
            return Err(AppError::Storage(format!("{:?} unavailable", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl ArticleStore for FailingStore {
    async fn find_unsummarized(&self, target: SummaryTarget) -> Result<Vec<Article>> {
        self.check(StoreOp::FindUnsummarized)?;
        self.inner.find_unsummarized(target).await
    }

    async fn upsert_summary(&self, article_id: i64, content: &str, model: &str) -> Result<()> {
        self.check(StoreOp::UpsertSummary)?;
        if self.failing_summaries.contains(&article_id) {
            return Err(AppError::Storage(format!(
                "summary for article {} rejected",
                article_id
            )));
        }
        self.inner.upsert_summary(article_id, content, model).await
    }

    async fn find_undigested(&self, user_id: i64, limit: usize) -> Result<Vec<Article>> {
        self.check(StoreOp::FindUndigested)?;
        self.inner.find_undigested(user_id, limit).await
    }

    async fn users_with_undigested(&self) -> Result<Vec<i64>> {
        self.check(StoreOp::UsersWithUndigested)?;
        self.inner.users_with_undigested().await
    }

    async fn find_digest(&self, user_id: i64, date: NaiveDate) -> Result<Option<DailyDigest>> {
        self.check(StoreOp::FindDigest)?;
        self.inner.find_digest(user_id, date).await
    }

    async fn create_digest_with_links(&self, digest: NewDigest) -> Result<i64> {
        self.check(StoreOp::CreateDigest)?;
        self.inner.create_digest_with_links(digest).await
    }

    async fn update_digest_audio(&self, digest_id: i64, locator: &str) -> Result<()> {
        self.check(StoreOp::UpdateDigestAudio)?;
        self.inner.update_digest_audio(digest_id, locator).await
    }

    async fn create_user(&self, auth_id: &str, name: &str) -> Result<User> {
        self.inner.create_user(auth_id, name).await
    }

    async fn save_article(&self, article: NewArticle) -> Result<Article> {
        self.inner.save_article(article).await
    }

    async fn delete_article(&self, user_id: i64, article_id: i64) -> Result<bool> {
        self.inner.delete_article(user_id, article_id).await
    }

    async fn list_articles(&self, user_id: i64) -> Result<Vec<Article>> {
        self.inner.list_articles(user_id).await
    }

    async fn get_summary(&self, article_id: i64) -> Result<Option<Summary>> {
        self.inner.get_summary(article_id).await
    }

    async fn list_digests(&self, user_id: i64) -> Result<Vec<DailyDigest>> {
        self.inner.list_digests(user_id).await
    }

    async fn digest_article_ids(&self, digest_id: i64) -> Result<Vec<i64>> {
        self.inner.digest_article_ids(digest_id).await
    }
}

/// Registers a user and saves one article per URL. Returns the user id and
/// article ids in save order.
pub(crate) async fn seed(store: &dyn ArticleStore, auth_id: &str, urls: &[&str]) -> (i64, Vec<i64>) {
    let user = store
        .create_user(auth_id, auth_id)
        .await
        .expect("create user");
    let mut ids = Vec::new();
    for url in urls {
        let article = store
            .save_article(NewArticle::validate(user.id, url, None).expect("valid url"))
            .await
            .expect("save article");
        ids.push(article.id);
    }
    (user.id, ids)
}
