//! Adapters that live inside the domain crate for convenience.
//!
//! Only the in-memory store belongs here; it is what tests substitute for
//! the file-backed store. Real persistence lives in separate adapter crates.

pub mod memory_store;
