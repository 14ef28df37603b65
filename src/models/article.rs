use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub auth_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub user_id: i64,
    pub url: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub user_id: i64,
    pub url: String,
    pub title: String,
}

impl NewArticle {
    /// Builds a saveable article from raw user input.
    ///
    /// The URL must be absolute http(s). A blank title falls back to the URL.
    pub fn validate(user_id: i64, url: &str, title: Option<&str>) -> Result<Self> {
        let url = validate_article_url(url)?;
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| url.clone());

        Ok(Self {
            user_id,
            url,
            title,
        })
    }
}

pub fn validate_article_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("URL is required".to_string()));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|e| AppError::Validation(format!("invalid URL {:?}: {}", trimmed, e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(AppError::Validation(format!(
                "unsupported URL scheme: {}",
                other
            )))
        }
    }

    if parsed.host_str().is_none() {
        return Err(AppError::Validation(format!("URL has no host: {}", trimmed)));
    }

    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https_url_and_defaults_title() {
        let article = NewArticle::validate(1, " https://example.com/post ", None).unwrap();
        assert_eq!(article.url, "https://example.com/post");
        assert_eq!(article.title, "https://example.com/post");
    }

    #[test]
    fn keeps_explicit_title() {
        let article =
            NewArticle::validate(1, "http://example.com/a", Some("  Rust news ")).unwrap();
        assert_eq!(article.title, "Rust news");
    }

    #[test]
    fn rejects_bad_urls() {
        for raw in ["", "   ", "not a url", "ftp://example.com/file", "mailto:me@example.com"] {
            let err = NewArticle::validate(1, raw, None).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{raw:?} -> {err}");
        }
    }
}
