//! WordPress sync client: local blogs and posts in SQLite, reconciled
//! against their remote REST representations.

pub mod config;
pub mod db;
pub mod gravatar;
pub mod media;
pub mod model;
pub mod remote;
pub mod repository;
pub mod widgets;
