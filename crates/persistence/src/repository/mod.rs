//! Repository implementations for database operations

pub mod bar_cache;

pub use bar_cache::*;
