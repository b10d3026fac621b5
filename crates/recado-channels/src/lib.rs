//! # recado-channels
//!
//! Messaging platform integrations for Recado.

pub mod telegram;
pub(crate) mod utils;
