//! Core types for the pressf-front Channel F front-end
//!
//! This crate provides the error taxonomy, configuration and logging
//! infrastructure shared by the storage subsystem and the boot machine.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{Config, Font, Scaling, Settings, SystemModel};
pub use error::{BootError, CodecError, FrontendError, Result, StorageError};
