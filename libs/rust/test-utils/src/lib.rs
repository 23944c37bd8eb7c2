//! Shared test utilities for the key service.
//!
//! This crate provides:
//! - Proptest generators for URNs and key material
//! - Test fixtures: sample identifiers, request bodies and signed tokens

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;
