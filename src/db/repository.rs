use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{Article, DailyDigest, NewArticle, NewDigest, Summary, SummaryTarget, User};

use super::schema::SCHEMA;
use super::store::ArticleStore;

const ARTICLE_COLUMNS: &str = "a.id, a.user_id, a.url, a.title, a.created_at";
const DIGEST_COLUMNS: &str = "id, user_id, generated_date, summary, audio_locator, created_at";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed [`ArticleStore`].
///
/// The handle is opened explicitly and should be closed with [`SqliteStore::close`]
/// once the pipeline is done with it.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref()).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn find_unsummarized(&self, target: SummaryTarget) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(move |conn| {
                let base = format!(
                    r#"SELECT {ARTICLE_COLUMNS}
                       FROM articles a
                       LEFT JOIN article_summaries s ON s.article_id = a.id
                       WHERE s.id IS NULL"#
                );
                let articles = match target {
                    SummaryTarget::User(user_id) => {
                        let mut stmt = conn.prepare(&format!(
                            "{base} AND a.user_id = ?1 ORDER BY a.created_at, a.id"
                        ))?;
                        let rows = stmt
                            .query_map(params![user_id], article_from_row)?
                            .collect::<std::result::Result<Vec<_>, _>>()?;
                        rows
                    }
                    SummaryTarget::AllUsers => {
                        let mut stmt =
                            conn.prepare(&format!("{base} ORDER BY a.created_at, a.id"))?;
                        let rows = stmt
                            .query_map([], article_from_row)?
                            .collect::<std::result::Result<Vec<_>, _>>()?;
                        rows
                    }
                };
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    async fn upsert_summary(&self, article_id: i64, content: &str, model: &str) -> Result<()> {
        let content = content.to_string();
        let model = model.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO article_summaries (article_id, content, model_version)
                       VALUES (?1, ?2, ?3)
                       ON CONFLICT(article_id) DO UPDATE SET
                           content = excluded.content,
                           model_version = excluded.model_version,
                           generated_at = datetime('now')"#,
                    params![article_id, content, model],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn find_undigested(&self, user_id: i64, limit: usize) -> Result<Vec<Article>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {ARTICLE_COLUMNS}
                       FROM articles a
                       WHERE a.user_id = ?1
                         AND NOT EXISTS (SELECT 1 FROM digest_articles d WHERE d.article_id = a.id)
                       ORDER BY a.created_at, a.id
                       LIMIT ?2"#
                ))?;
                let articles = stmt
                    .query_map(params![user_id, limit], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    async fn users_with_undigested(&self) -> Result<Vec<i64>> {
        let ids = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT DISTINCT a.user_id
                       FROM articles a
                       WHERE NOT EXISTS (SELECT 1 FROM digest_articles d WHERE d.article_id = a.id)
                       ORDER BY a.user_id"#,
                )?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, i64>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    async fn find_digest(&self, user_id: i64, date: NaiveDate) -> Result<Option<DailyDigest>> {
        let date = date.format(DATE_FORMAT).to_string();
        let digest = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {DIGEST_COLUMNS} FROM daily_digests WHERE user_id = ?1 AND generated_date = ?2"
                ))?;
                let digest = stmt
                    .query_row(params![user_id, date], digest_from_row)
                    .optional()?;
                Ok(digest)
            })
            .await?;
        Ok(digest)
    }

    async fn create_digest_with_links(&self, digest: NewDigest) -> Result<i64> {
        let digest_id = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    r#"INSERT INTO daily_digests (user_id, generated_date, summary, audio_locator)
                       VALUES (?1, ?2, ?3, NULL)"#,
                    params![
                        digest.user_id,
                        digest.generated_date.format(DATE_FORMAT).to_string(),
                        digest.summary,
                    ],
                )?;
                let digest_id = tx.last_insert_rowid();
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO digest_articles (digest_id, article_id) VALUES (?1, ?2)",
                    )?;
                    for article_id in &digest.article_ids {
                        stmt.execute(params![digest_id, article_id])?;
                    }
                }
                tx.commit()?;
                Ok(digest_id)
            })
            .await?;
        Ok(digest_id)
    }

    async fn update_digest_audio(&self, digest_id: i64, locator: &str) -> Result<()> {
        let locator = locator.to_string();
        let updated = self
            .conn
            .call(move |conn| {
                let updated = conn.execute(
                    "UPDATE daily_digests SET audio_locator = ?1 WHERE id = ?2",
                    params![locator, digest_id],
                )?;
                Ok(updated)
            })
            .await?;

        if updated == 0 {
            return Err(AppError::NotFound(format!("daily digest {}", digest_id)));
        }
        Ok(())
    }

    async fn create_user(&self, auth_id: &str, name: &str) -> Result<User> {
        let auth_id = auth_id.to_string();
        let name = name.to_string();
        let user = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO users (auth_id, name) VALUES (?1, ?2) ON CONFLICT(auth_id) DO NOTHING",
                    params![auth_id, name],
                )?;
                let user = conn.query_row(
                    "SELECT id, auth_id, name, created_at FROM users WHERE auth_id = ?1",
                    params![auth_id],
                    user_from_row,
                )?;
                Ok(user)
            })
            .await?;
        Ok(user)
    }

    async fn save_article(&self, article: NewArticle) -> Result<Article> {
        let url = article.url.clone();
        let saved = self
            .conn
            .call(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM articles WHERE user_id = ?1 AND url = ?2)",
                    params![article.user_id, article.url],
                    |row| row.get(0),
                )?;
                if exists {
                    return Ok(None);
                }

                conn.execute(
                    "INSERT INTO articles (user_id, url, title) VALUES (?1, ?2, ?3)",
                    params![article.user_id, article.url, article.title],
                )?;
                let id = conn.last_insert_rowid();
                let saved = conn.query_row(
                    &format!("SELECT {ARTICLE_COLUMNS} FROM articles a WHERE a.id = ?1"),
                    params![id],
                    article_from_row,
                )?;
                Ok(Some(saved))
            })
            .await?;

        saved.ok_or_else(|| AppError::Validation(format!("article already saved: {}", url)))
    }

    async fn delete_article(&self, user_id: i64, article_id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let owned: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM articles WHERE id = ?1 AND user_id = ?2)",
                    params![article_id, user_id],
                    |row| row.get(0),
                )?;
                if !owned {
                    return Ok(false);
                }
                // Delete related data first
                tx.execute(
                    "DELETE FROM article_summaries WHERE article_id = ?1",
                    params![article_id],
                )?;
                tx.execute(
                    "DELETE FROM digest_articles WHERE article_id = ?1",
                    params![article_id],
                )?;
                tx.execute("DELETE FROM articles WHERE id = ?1", params![article_id])?;
                tx.commit()?;
                Ok(true)
            })
            .await?;
        Ok(deleted)
    }

    async fn list_articles(&self, user_id: i64) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles a WHERE a.user_id = ?1 ORDER BY a.created_at DESC, a.id DESC"
                ))?;
                let articles = stmt
                    .query_map(params![user_id], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    async fn get_summary(&self, article_id: i64) -> Result<Option<Summary>> {
        let summary = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, article_id, content, model_version, generated_at FROM article_summaries WHERE article_id = ?1",
                )?;
                let summary = stmt
                    .query_row(params![article_id], summary_from_row)
                    .optional()?;
                Ok(summary)
            })
            .await?;
        Ok(summary)
    }

    async fn list_digests(&self, user_id: i64) -> Result<Vec<DailyDigest>> {
        let digests = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {DIGEST_COLUMNS} FROM daily_digests WHERE user_id = ?1 ORDER BY generated_date DESC"
                ))?;
                let digests = stmt
                    .query_map(params![user_id], digest_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(digests)
            })
            .await?;
        Ok(digests)
    }

    async fn digest_article_ids(&self, digest_id: i64) -> Result<Vec<i64>> {
        let ids = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT article_id FROM digest_articles WHERE digest_id = ?1 ORDER BY article_id",
                )?;
                let ids = stmt
                    .query_map(params![digest_id], |row| row.get::<_, i64>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime format, with or without fractional seconds
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    None
}

fn timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    Ok(parse_datetime(&raw).unwrap_or_else(Utc::now))
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        auth_id: row.get(1)?,
        name: row.get(2)?,
        created_at: timestamp(row, 3)?,
    })
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        user_id: row.get(1)?,
        url: row.get(2)?,
        title: row.get(3)?,
        created_at: timestamp(row, 4)?,
    })
}

fn summary_from_row(row: &Row) -> rusqlite::Result<Summary> {
    Ok(Summary {
        id: row.get(0)?,
        article_id: row.get(1)?,
        content: row.get(2)?,
        model_version: row.get(3)?,
        generated_at: timestamp(row, 4)?,
    })
}

fn digest_from_row(row: &Row) -> rusqlite::Result<DailyDigest> {
    let raw_date: String = row.get(2)?;
    let generated_date = NaiveDate::parse_from_str(&raw_date, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(DailyDigest {
        id: row.get(0)?,
        user_id: row.get(1)?,
        generated_date,
        summary: row.get(3)?,
        audio_locator: row.get(4)?,
        created_at: timestamp(row, 5)?,
    })
}
