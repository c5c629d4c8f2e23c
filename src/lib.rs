//! Setlist curator library: resolves concert setlists to catalog tracks and
//! maintains the collections created from them.

pub mod catalog;
pub mod config;
pub mod creator;
pub mod dedup;
pub mod error;
pub mod housekeeping;
pub mod memory;
pub mod models;
pub mod naming;
pub mod normalize;
pub mod progress;
pub mod query;
pub mod ranking;
pub mod resolver;
pub mod retry;

pub use error::{CatalogError, Error, Result};
