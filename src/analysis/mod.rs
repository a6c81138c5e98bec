//! Analysis modules.
//!
//! Question fallback chains and the per-variant result aggregator.

pub mod aggregator;
pub mod questions;

pub use aggregator::{aggregate, combined_competitors};
pub use questions::QuestionSet;
