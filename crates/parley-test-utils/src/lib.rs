#![deny(unsafe_code)]

//! Shared test utilities for the Parley workspace.
//!
//! Provides an in-process mock HTTP backend, a fake inference binary, log
//! capture, chunk splitters, and config builders so that individual crate
//! tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! parley-test-utils = { workspace = true }
//! ```

#[cfg(unix)]
pub mod binary;
pub mod capture;
pub mod chunks;
pub mod config;
pub mod mock;
pub mod tracing_setup;
