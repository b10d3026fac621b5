//! # recado-memory
//!
//! SQLite-backed local persistence: reminder rows and learned task aliases.

mod store;

pub use store::{Reminder, Store};
