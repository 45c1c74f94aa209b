//! Independent facet scorers. Every scorer is total: it never fails, and
//! follows the shared empty-input convention (both sides empty scores 1.0,
//! exactly one side empty scores 0.0).

pub mod base_image;
pub mod commands;
pub mod context;
pub mod metadata;
pub mod platform;
pub mod workdir;
