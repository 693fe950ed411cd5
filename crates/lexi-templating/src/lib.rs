//! Lexi Templating — turning documents into templates and templates into drafts.
//!
//! - [`extraction`]: variable extraction from document text, chunked for long inputs
//! - [`matcher`]: ranking stored templates against a request and prefilling answers
//! - [`questions`]: phrasing questions for unanswered variables
//! - [`render`]: placeholder substitution with `[MISSING: key]` markers
//! - [`export`]: variable export and Markdown front-matter

pub mod export;
pub mod extraction;
pub mod matcher;
pub mod questions;
pub mod render;

pub use export::{template_markdown, variables_csv, ExportFormat};
pub use extraction::{merge_variables, ExtractionResult, TemplateBodyGenerator, VariableExtractor};
pub use matcher::{MatchOutcome, Matcher, Ranking, TemplateMatch};
pub use questions::{generate_questions, select_missing, VariableQuestion};
pub use render::render;
