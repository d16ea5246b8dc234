//! Record model for containers and fragments.
//!
//! # Responsibility
//! - Define read models returned by the record store.
//! - Hold reserved identifiers and discriminator encodings.
//!
//! # Invariants
//! - Containers are identified by store-assigned `i64` ids; `<= 0` is reserved.
//! - Fragments belong to exactly one container.

pub mod container;
pub mod fragment;
