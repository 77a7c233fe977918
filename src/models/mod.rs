//! Core data models for the video catalog.
//!
//! These entities describe catalogued groups, their taxonomy and the stored
//! objects they reference. Row-shaped types map to database tables via
//! `sqlx::FromRow` and all of them serialize as JSON via `serde`.

pub mod category;
pub mod language;
pub mod object;
pub mod video_group;
