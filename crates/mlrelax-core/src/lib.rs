//! # mlrelax Core Library
//!
//! An orchestration layer over machine-learned interatomic potentials. It wires
//! together swappable calculator backends, a structural optimizer with an optional
//! symmetry constraint, a frozen-phonon post-processing routine, and a band-gap
//! predictor conditioned on an exchange-correlation functional.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a clear
//! separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains the stateless data model
//!   (`AtomicSystem`), static element data, and structure/trajectory I/O.
//!
//! - **[`engine`]: The Logic Core.** This layer hosts the calculator seam and its
//!   backends, the FIRE minimizer with its coordinate filters, the space-group
//!   constraint, and the frozen-phonon routine.
//!
//! - **[`workflows`]: The Public API.** The highest-level, user-facing layer. It
//!   composes the engine into complete procedures: two-phase relaxation, phonon
//!   spectra with optional pre-relaxation, and band-gap prediction.

pub mod core;
pub mod engine;
pub mod workflows;
