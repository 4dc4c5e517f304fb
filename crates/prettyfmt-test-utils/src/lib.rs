#![deny(unsafe_code)]

//! Shared test utilities for the prettyfmt workspace.
//!
//! Provides a settings builder, a scripted stand-in for the formatter
//! process, and a temporary project fixture so that
//! individual crate tests stay concise.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! prettyfmt-test-utils = { workspace = true }
//! ```

pub mod project;
pub mod runner;
pub mod settings;
