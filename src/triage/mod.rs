//! Heuristic ESI triage. The level is computed from rules only; the model
//! is never consulted for it.

pub mod classifier;
pub mod keywords;
pub mod service;

pub use classifier::classify;
pub use keywords::{high_risk_matches, ComplaintTopic};
pub use service::TriageService;
