//! Batch summarization and daily audio digests for saved articles.
//!
//! The [`App`] composition root wires an [`db::ArticleStore`], a
//! [`ai::TextGenerator`] and a [`speech::SpeechSynthesizer`] into the three
//! pipeline stages in [`services`]: per-article summaries, per-user daily
//! digests, and the batch driver that runs digests for every eligible user.

pub mod ai;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod speech;

pub use app::{App, BatchRunReport};
pub use config::Config;
pub use error::{AppError, Result};
