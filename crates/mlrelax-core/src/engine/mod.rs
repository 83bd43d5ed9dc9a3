//! # Engine Module
//!
//! The computational layer behind the workflows: the calculator seam and its
//! swappable backends, the FIRE minimizer with its coordinate filters, the
//! space-group constraint, and the frozen-phonon routine.
//!
//! ## Architecture
//!
//! - **Calculator Seam** ([`calculator`]) - Backend selection, model registry,
//!   and the energy/force/stress evaluation contract
//! - **Minimization** ([`fire`], [`filter`]) - FIRE optimizer over generalized
//!   coordinates, position-only or combined position-and-cell views
//! - **Symmetry** ([`symmetry`]) - Space-group detection and the constraint
//!   restricting optimizer moves to symmetry-preserving ones
//! - **Phonons** ([`phonon`]) - Finite-displacement force constants, dynamical
//!   matrices, and band-structure output
//! - **Error Handling** ([`error`]) - Engine-wide error type

pub mod calculator;
pub mod error;
pub mod filter;
pub mod fire;
pub mod phonon;
pub mod symmetry;
