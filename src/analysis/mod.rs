//! Analysis modules.
//!
//! Pure transformations of backend responses: plagiarism match-graph
//! aggregation and grading normalization.

pub mod aggregator;
pub mod grading;

pub use aggregator::*;
pub use grading::*;
