//! De-identification of free text and the PHI logging audit.

pub mod phi_audit;
pub mod scrubber;

pub use scrubber::*;
