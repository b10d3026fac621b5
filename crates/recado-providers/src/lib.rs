//! # recado-providers
//!
//! Intent-extraction provider implementations.

pub mod openai;

pub use openai::OpenAiProvider;
