//! rubric-server - Lesson planning assistant service.
//!
//! Accepts teaching-philosophy documents, condenses them into a background
//! summary, records a conversation, and renders placeholder lesson plans,
//! assessments, and rubrics from that session state.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod documents;
pub mod error;
pub mod extract;
pub mod form;
pub mod routes;
pub mod summarize;

pub use documents::DocumentKind;
pub use error::ServiceError;
pub use extract::{extract_text, DocumentFormat};
pub use form::FormFields;
pub use routes::{build_router, AppState};
pub use summarize::summarize;
