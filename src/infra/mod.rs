//! Infrastructure layer — concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: the Docker daemon gateway,
//! registry file persistence, and SSH key management.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod docker;
pub mod registry;
pub mod ssh;
