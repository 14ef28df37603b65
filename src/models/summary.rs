use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: i64,
    pub article_id: i64,
    pub content: String,
    pub model_version: String,
    pub generated_at: DateTime<Utc>,
}

/// Which users' articles a summarization run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryTarget {
    User(i64),
    #[default]
    AllUsers,
}

impl fmt::Display for SummaryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryTarget::User(id) => write!(f, "user {}", id),
            SummaryTarget::AllUsers => write!(f, "all users"),
        }
    }
}
