//! HTTP API handlers

pub mod commit;
pub mod error;
pub mod health;
pub mod licenses;
pub mod sync;

pub use commit::commit_licenses;
pub use error::ApiError;
pub use health::health_routes;
pub use licenses::{list_or_verify, verify_license};
pub use sync::sync_licenses;
