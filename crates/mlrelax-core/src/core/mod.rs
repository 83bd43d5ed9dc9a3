//! # Core Module
//!
//! Fundamental building blocks shared by every workflow: the atomic-structure
//! data model, static element data, and file I/O.
//!
//! ## Architecture
//!
//! - **Structure Representation** ([`models`]) - Periodic atomic configurations
//!   and per-element reference data
//! - **File I/O** ([`io`]) - POSCAR structure files and extended-XYZ trajectories

pub mod io;
pub mod models;
