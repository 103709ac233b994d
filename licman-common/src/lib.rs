//! # License Manager Common Library
//!
//! Shared code for the license manager service:
//! - License record model and key normalization
//! - Multi-source reconciliation and status evaluation
//! - Batch normalization for submitted collections
//! - Configuration loading
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod license;
pub mod time;

pub use error::{Error, Result};
pub use license::{License, LicenseRecord};
