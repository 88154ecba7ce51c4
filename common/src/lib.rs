//! # reconr common
//!
//! Types shared by the engine and the command line: the error taxonomy, the
//! runtime [`config::Config`], and the [`network`] helpers used to turn user
//! input into targets the probing engine understands.

pub mod config;
pub mod error;
pub mod network;

pub use error::{ReconError, Result};
