//! Database module: entity mapping and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: row-to-entity mapping and write-side view structs.
//! - `repo`: SQL-only functions that map rows into entities.
//!
//! External modules should import from `wp_sync::db` — we re-export the
//! repository API and the write-side view model for convenience.

pub mod model;
pub mod repo;

pub use model::PostFields;
pub use repo::*;
