use crate::cli::RelaxArgs;
use crate::error::Result;
use indicatif::{ProgressBar, ProgressStyle};
use mlrelax::core::io::poscar;
use mlrelax::engine::calculator::CalculatorSpec;
use mlrelax::engine::filter::CellFilterOptions;
use mlrelax::workflows::{RelaxConfig, relax};
use std::time::Duration;
use tracing::info;

pub fn run(args: RelaxArgs) -> Result<()> {
    let system = poscar::read(&args.input)?;
    info!(
        atoms = system.len(),
        input = %args.input.display(),
        backend = %args.backend,
        "structure loaded"
    );

    let config = RelaxConfig {
        fmax: args.fmax,
        relax_cell: !args.no_cell,
        symmetry: !args.no_symmetry,
        cell_factor: args.cell_factor,
        rattle: args.rattle,
        model_path: args.model_path.clone(),
        traj_file: (!args.no_traj).then(|| args.traj_file.clone()),
        output_file: Some(args.output.clone()),
        cell_options: CellFilterOptions {
            hydrostatic_strain: args.hydrostatic_strain,
            constant_volume: args.constant_volume,
            scalar_pressure: args.pressure,
        },
        ..RelaxConfig::default()
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()));
    spinner.set_message(format!("Relaxing {} atoms with {}...", system.len(), args.backend));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let outcome = relax(&system, CalculatorSpec::from(args.backend.as_str()), &config)?;

    spinner.finish_and_clear();
    println!(
        "Relaxed {} atoms in {} + {} steps (E = {:.6} eV).",
        outcome.system.len(),
        outcome.coarse_steps,
        outcome.fine_steps,
        outcome.energy
    );
    if let Some(spacegroup) = outcome.spacegroup {
        println!("Space group {spacegroup} held fixed throughout.");
    }
    println!("Relaxed structure written to {}.", args.output.display());
    Ok(())
}
