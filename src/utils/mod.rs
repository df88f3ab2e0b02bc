//! Shared Utilities

pub mod hashing;

pub use hashing::{HashedName, name_hash};
