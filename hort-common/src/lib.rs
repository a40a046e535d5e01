//! # Hort Common Library
//!
//! Shared code for the hort attendance platform:
//! - Error taxonomy used by all services
//! - Configuration loading and cutoff-time parsing
//! - Database schema, connection helpers and row models

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
