//! Utilities shared across perch crates.
//!
//! Currently this is only the centralised tracing/logging setup in
//! [`observability`]; it lives in its own crate so both the binary and
//! integration tests can initialise logging the same way.

pub mod observability;
