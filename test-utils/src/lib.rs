//! Shared test utilities for service-utils.
//!
//! This crate provides:
//! - Proptest generators for URLs, status codes, headers and payloads
//! - A scripted HTTP transport and a recording tracer
//! - Fixtures for id tokens, trust contexts and emails

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
