//! Core utilities for the presentation subsystem.
//!
//! This crate provides foundational types shared by every other crate:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - Configuration management

pub mod config;
mod error;
mod logging;
mod timer;

pub use config::{PresentConfig, PresentMode, SurfaceFormat};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
