use crate::core::models::atoms::AtomicSystem;
use crate::engine::calculator::registry::{self, GapModel};
use crate::engine::error::EngineError;
use crate::workflows::error::WorkflowError;
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// The exchange-correlation fidelities the multi-fidelity gap model was
/// trained on, in the order of their state labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XcFunctional {
    Pbe,
    GllbSc,
    Hse,
    Scan,
}

impl XcFunctional {
    /// State label fed to the model: PBE 0, GLLB-SC 1, HSE 2, SCAN 3.
    pub fn code(self) -> usize {
        match self {
            XcFunctional::Pbe => 0,
            XcFunctional::GllbSc => 1,
            XcFunctional::Hse => 2,
            XcFunctional::Scan => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            XcFunctional::Pbe => "PBE",
            XcFunctional::GllbSc => "GLLB-SC",
            XcFunctional::Hse => "HSE",
            XcFunctional::Scan => "SCAN",
        }
    }
}

impl FromStr for XcFunctional {
    type Err = EngineError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        match label {
            "PBE" => Ok(XcFunctional::Pbe),
            "GLLB-SC" => Ok(XcFunctional::GllbSc),
            "HSE" => Ok(XcFunctional::Hse),
            "SCAN" => Ok(XcFunctional::Scan),
            _ => Err(EngineError::InvalidFunctional(label.to_string())),
        }
    }
}

impl fmt::Display for XcFunctional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Band-gap predictor holding the multi-fidelity model, loaded once at
/// construction and reused across structures.
pub struct GapPredictor {
    model: GapModel,
}

impl GapPredictor {
    pub fn new() -> Result<Self, WorkflowError> {
        let model = registry::load_gap_model(registry::MEGNET_BANDGAP)?;
        info!(model = %model.name, "gap model loaded");
        Ok(Self { model })
    }

    /// Predicted band gap in eV at the requested fidelity.
    pub fn predict_gap(&self, system: &AtomicSystem, xc: XcFunctional) -> f64 {
        self.model.predict(system, xc.code())
    }
}

/// One-shot prediction: loads the model, predicts, and drops it. Callers
/// with several structures should construct a [`GapPredictor`] instead.
pub fn predict_gap(system: &AtomicSystem, xc: &str) -> Result<f64, WorkflowError> {
    let functional: XcFunctional = xc.parse::<XcFunctional>().map_err(WorkflowError::from)?;
    Ok(GapPredictor::new()?.predict_gap(system, functional))
}
