//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod backup;
pub mod config;
pub mod error;
pub mod network;
pub mod nginx;
pub mod unit;

pub use config::{Settings, validate_settings};
pub use error::{
    BackupError, BundleError, ConfigError, ConfirmationError, ExternalCommandError,
    InstanceError, PrivilegeError, VhostError,
};
