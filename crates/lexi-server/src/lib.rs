//! Lexi Server — HTTP surface for uploads, the template catalog, chat and drafts.

pub mod error;
pub mod extract;
pub mod routes;
pub mod seed;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use extract::ApiJson;
pub use routes::build_router;
pub use state::AppState;
