//! Lexi Store — SQLite catalog of templates, uploads and drafts.

pub mod embedding;
pub mod ids;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use embedding::cosine_similarity;
pub use ids::generate_template_id;
pub use sqlite::SqliteStore;
pub use types::*;
