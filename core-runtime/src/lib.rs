//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the sync engine:
//! - Logging and tracing infrastructure
//! - Configuration management (sync settings and injected bridges)
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that `core-sync` depends on.
//! It establishes the logging conventions, the settings every sync attempt
//! reads, and the broadcast channel UI collaborators subscribe to.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
