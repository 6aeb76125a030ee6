//! Social-platform client and normalization core for perch.
//!
//! The [`twitter`] module owns everything between the raw HTTP payloads and
//! the domain model the CLI renders: identifier resolution, entity
//! extraction, thread/timeline assembly, and the authenticated→guest
//! request fallback.
pub mod twitter;
