//! # recado-core
//!
//! Core types, traits, configuration, and error handling for the Recado
//! task assistant.

pub mod config;
pub mod error;
pub mod intent;
pub mod message;
pub mod task;
pub mod text;
pub mod traits;
