//! Testing Framework
//!
//! Fixture loading, record sanitization and the result comparator.

pub mod comparator;
pub mod fixtures;
pub mod sanitize;

// Re-export main types
pub use comparator::{FailureReason, Verdict, compare};
pub use fixtures::{FixtureLoader, list_expected_output_files, list_input_files, load_records};
pub use sanitize::{JsonLdSanitizer, LineSanitizer, Sanitizer, sanitizer_for};
