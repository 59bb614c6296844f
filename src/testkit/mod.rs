//! Mock implementations and builders for testing.
//!
//! Available to unit tests and, behind the `testkit` feature, to the
//! crate's integration tests.

pub mod control;
pub mod handler;
pub mod message;
pub mod registry;
