//! Use-case services over the record store.
//!
//! # Responsibility
//! - Validate folder and call record rules above the store.
//! - Keep callers decoupled from filter/column details.

pub mod call_record_service;
pub mod folder_service;
