//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod backup;
pub mod install;
pub mod process;
pub mod proxy;
pub mod restore;
pub mod systemd;
pub mod uninstall;
pub mod vhost;
