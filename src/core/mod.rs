//! # Core Module
//!
//! Shared-ownership primitives used between the update thread and the chunk workers.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking. Every resident
//!   chunk lives behind one, so a worker can hold a chunk handle without holding the store.

pub mod mt_resource;

pub use mt_resource::MtResource;
