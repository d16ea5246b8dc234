//! Search entry points.
//!
//! # Responsibility
//! - Expose snippet search over notes.
//! - Keep result shaping inside core.

pub mod snippet;
