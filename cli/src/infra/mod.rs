//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, filesystem
//! access, archives, downloads, registry persistence and kernel tables.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod archive;
pub mod bundle;
pub mod command_runner;
pub mod config;
pub mod fs;
pub mod host;
pub mod network;
pub mod privilege;
pub mod registry;
pub mod vhost;

pub use host::LocalHost;
