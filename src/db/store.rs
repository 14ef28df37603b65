use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{Article, DailyDigest, NewArticle, NewDigest, Summary, SummaryTarget, User};

/// Persistence capabilities the pipeline depends on.
///
/// The orchestration code only talks to this trait, so tests and alternative
/// backends can stand in for [`super::SqliteStore`].
#[async_trait]
pub trait ArticleStore: Send + Sync {
    // Pipeline operations

    /// Articles with no summary, oldest first.
    async fn find_unsummarized(&self, target: SummaryTarget) -> Result<Vec<Article>>;

    /// Insert or replace the summary for `article_id`.
    async fn upsert_summary(&self, article_id: i64, content: &str, model: &str) -> Result<()>;

    /// Up to `limit` of the user's articles not linked into any digest, oldest first.
    async fn find_undigested(&self, user_id: i64, limit: usize) -> Result<Vec<Article>>;

    /// Ids of users owning at least one undigested article, ascending.
    async fn users_with_undigested(&self) -> Result<Vec<i64>>;

    async fn find_digest(&self, user_id: i64, date: NaiveDate) -> Result<Option<DailyDigest>>;

    /// Creates the digest row and its article links atomically. Returns the digest id.
    async fn create_digest_with_links(&self, digest: NewDigest) -> Result<i64>;

    async fn update_digest_audio(&self, digest_id: i64, locator: &str) -> Result<()>;

    // Account and article management

    /// Returns the user for `auth_id`, creating it on first sight.
    async fn create_user(&self, auth_id: &str, name: &str) -> Result<User>;

    async fn save_article(&self, article: NewArticle) -> Result<Article>;

    /// Deletes the article together with its summary and digest link.
    async fn delete_article(&self, user_id: i64, article_id: i64) -> Result<bool>;

    async fn list_articles(&self, user_id: i64) -> Result<Vec<Article>>;

    async fn get_summary(&self, article_id: i64) -> Result<Option<Summary>>;

    /// Newest first.
    async fn list_digests(&self, user_id: i64) -> Result<Vec<DailyDigest>>;

    async fn digest_article_ids(&self, digest_id: i64) -> Result<Vec<i64>>;
}
