use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A user's combined summary for one calendar day.
///
/// `audio_locator` stays `None` until speech generation finishes, so readers
/// must cope with a digest that has text but no audio yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyDigest {
    pub id: i64,
    pub user_id: i64,
    pub generated_date: NaiveDate,
    pub summary: String,
    pub audio_locator: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDigest {
    pub user_id: i64,
    pub generated_date: NaiveDate,
    pub summary: String,
    pub article_ids: Vec<i64>,
}

