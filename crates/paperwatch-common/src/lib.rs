//! paperwatch-common — Shared error taxonomy used across all paperwatch crates.

pub mod error;

pub use error::{PaperwatchError, Result};
