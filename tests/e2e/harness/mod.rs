//! E2E test harness for Story sessions.
//!
//! This module contains test infrastructure with builders, variants, and
//! methods that not every scenario uses.

#![allow(dead_code)]

pub mod runner;
pub mod steps;

// Re-export commonly used types
pub use assertions::{Assertion, ErrorMatch};
pub use scenario::Scenario;
