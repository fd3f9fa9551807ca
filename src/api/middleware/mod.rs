//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Rate limiter, rejects early on model-backed routes
//! 2. Audit logger, records the handler's status code

pub mod audit;
pub mod rate;
