use crate::cli::GapArgs;
use crate::error::Result;
use mlrelax::core::io::poscar;
use mlrelax::workflows::predict_gap;
use tracing::info;

pub fn run(args: GapArgs) -> Result<()> {
    let system = poscar::read(&args.input)?;
    info!(
        atoms = system.len(),
        input = %args.input.display(),
        xc = %args.xc,
        "structure loaded"
    );

    let gap = predict_gap(&system, &args.xc)?;
    println!("The predicted {} band gap is {gap:.3} eV.", args.xc);
    Ok(())
}
