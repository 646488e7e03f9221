//! Shared foundation for the Picks services.
//!
//! Provides the pieces every service needs and nothing more:
//! - [`config`]: layered runtime configuration (defaults ← file ← env)
//! - [`error`]: the unified error type
//! - [`logging`]: structured logging bootstrap

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
