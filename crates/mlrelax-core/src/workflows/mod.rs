//! High-level procedures composed from the engine layer: structure
//! relaxation, frozen-phonon spectra, and band-gap prediction.

pub mod error;
pub mod gap;
pub mod phonon;
pub mod relax;

pub use error::WorkflowError;
pub use gap::{GapPredictor, XcFunctional, predict_gap};
pub use phonon::{PhononOptions, phonon_with_ml};
pub use relax::{RelaxConfig, RelaxOutcome, relax, relax_with_calculator, relax_with_matgl};
