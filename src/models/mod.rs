pub mod audit;
pub mod note;
pub mod patient;
pub mod triage;
pub mod vitals;

pub use audit::*;
pub use note::*;
pub use patient::*;
pub use triage::*;
pub use vitals::*;
