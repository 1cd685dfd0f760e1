//! LSC Cache Snapshot Format and Loader
//!
//! A compiled rule set is persisted as a flat little-endian snapshot so a
//! restart with an unchanged rule document skips JSON parsing.

mod format;
mod loader;

pub use format::*;
pub use loader::*;
