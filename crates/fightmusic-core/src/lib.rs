//! # fightmusic-core
//!
//! Core types, traits, and error handling for the Fight Music trigger.

pub mod client;
pub mod error;
pub mod types;

pub use client::{select_active_device, PlaybackClient};
pub use error::{Error, HttpError, Result};
pub use types::*;
