mod article;
mod digest;
mod summary;

pub use article::{validate_article_url, Article, NewArticle, User};
pub use digest::{DailyDigest, NewDigest};
pub use summary::{Summary, SummaryTarget};
