mod repository;
mod schema;
mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use repository::SqliteStore;
pub use store::ArticleStore;
