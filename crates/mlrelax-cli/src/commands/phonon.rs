use crate::cli::PhononArgs;
use crate::error::{CliError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use mlrelax::core::io::poscar;
use mlrelax::engine::calculator::CalculatorSpec;
use mlrelax::engine::phonon::PhononOverrides;
use mlrelax::workflows::{PhononOptions, phonon_with_ml};
use nalgebra::Vector3;
use std::time::Duration;
use tracing::info;

fn parse_kvector(text: &str) -> Result<Vector3<f64>> {
    let components: Vec<f64> = text
        .split(',')
        .map(|c| c.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| CliError::Argument(format!("invalid k-vector '{text}'")))?;
    if components.len() != 3 {
        return Err(CliError::Argument(format!(
            "k-vector '{text}' must have exactly three components"
        )));
    }
    Ok(Vector3::new(components[0], components[1], components[2]))
}

pub fn run(args: PhononArgs) -> Result<()> {
    let system = poscar::read(&args.input)?;
    info!(
        atoms = system.len(),
        input = %args.input.display(),
        backend = %args.backend,
        "structure loaded"
    );

    let kvectors = if args.kvectors.is_empty() {
        None
    } else {
        Some(
            args.kvectors
                .iter()
                .map(|text| parse_kvector(text))
                .collect::<Result<Vec<_>>>()?,
        )
    };
    if let Some(vectors) = &kvectors {
        if !args.knames.is_empty() && args.knames.len() != vectors.len() {
            return Err(CliError::Argument(format!(
                "{} k-point labels given for {} k-vectors",
                args.knames.len(),
                vectors.len()
            )));
        }
    }

    let overrides = PhononOverrides {
        ndim: args.ndim.as_ref().map(|n| [n[0], n[1], n[2]]),
        distance: args.distance,
        symprec: args.symprec,
        is_symmetry: args.no_fc_symmetry.then_some(false),
        ..PhononOverrides::default()
    };
    let options = PhononOptions {
        relax: args.relax,
        plot: !args.no_plot,
        knames: (!args.knames.is_empty()).then(|| args.knames.clone()),
        kvectors,
        npoints: args.npoints,
        figname: args.figname.clone(),
        band_file: args.band_file.clone(),
        overrides,
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!(
        "Computing phonons for {} atoms with {}...",
        system.len(),
        args.backend
    ));
    spinner.enable_steady_tick(Duration::from_millis(120));

    phonon_with_ml(&system, CalculatorSpec::from(args.backend.as_str()), &options)?;

    spinner.finish_and_clear();
    println!("Band structure written to {}.", args.band_file.display());
    if !args.no_plot {
        println!("Band figure written to {}.", args.figname.display());
    }
    Ok(())
}
