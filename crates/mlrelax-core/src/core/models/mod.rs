//! Data structures describing periodic atomic configurations.
//!
//! The central type is [`atoms::AtomicSystem`], a plain owned value that every
//! procedure copies before mutating, so callers never observe in-place changes.

pub mod atoms;
pub mod element;
