mod batch;
mod digest;
mod summarizer;

pub use batch::{BatchDriver, BatchReport, UserFailure, DEFAULT_USER_CHUNK_SIZE};
pub use digest::{
    artifact_identifier, DailyDigestBuilder, DigestOutcome, DigestRequest,
    DEFAULT_DIGEST_ARTICLE_LIMIT,
};
pub use summarizer::{ArticleSummarizer, SummaryRunResult, DEFAULT_CONCURRENCY_LIMIT};
