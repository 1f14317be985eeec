//! # Rollcall Common Library
//!
//! Shared code for the rollcall services including:
//! - Error type
//! - Bootstrap configuration loading (TOML, environment, defaults)
//! - Attendance event types and the EventBus
//! - Server-Sent Events helpers
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
