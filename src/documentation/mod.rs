//! SOAP note drafting, quality checks and export formats.

pub mod export;
pub mod quality;
pub mod service;
pub mod templates;

pub use export::{format_all, format_all_at, to_fhir, to_plain_text, ExportBundle};
pub use quality::run_all as run_quality_checks;
pub use service::{build_note_prompt, DocumentationService, SYSTEM_PROMPT};
pub use templates::{get_template, NoteTemplate};
