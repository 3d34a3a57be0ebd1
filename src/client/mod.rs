//! Backend client modules.
//!
//! This module provides the typed HTTP client for the grading backend.

pub mod api;

pub use api::{ClientConfig, GradeMateClient};
