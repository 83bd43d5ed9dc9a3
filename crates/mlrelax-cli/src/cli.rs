use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "mlrelax - structure relaxation, phonon spectra, and band-gap prediction with machine-learned interatomic potentials.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Relax atomic positions and, by default, the cell shape.
    Relax(RelaxArgs),
    /// Compute a frozen-phonon band structure.
    Phonon(PhononArgs),
    /// Predict the electronic band gap at a chosen fidelity.
    Gap(GapArgs),
}

/// Arguments for the `relax` subcommand.
#[derive(Args, Debug)]
pub struct RelaxArgs {
    /// Path to the input structure in POSCAR format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the relaxed structure, written in POSCAR format.
    #[arg(short, long, value_name = "PATH", default_value = "POSCAR_relax.vasp")]
    pub output: PathBuf,

    /// Backend tag: matgl, m3gnet, chgnet, or deepmd.
    #[arg(short, long, value_name = "TAG", default_value = "chgnet")]
    pub backend: String,

    /// Model file or directory for backends that load from disk.
    #[arg(long, value_name = "PATH")]
    pub model_path: Option<PathBuf>,

    /// Convergence threshold on the maximum force component (eV/Å).
    #[arg(short, long, value_name = "FLOAT", default_value_t = 1e-3)]
    pub fmax: f64,

    /// Relax only the atomic positions, keeping the cell fixed.
    #[arg(long)]
    pub no_cell: bool,

    /// Do not hold the detected space group fixed during the run.
    #[arg(long)]
    pub no_symmetry: bool,

    /// Scale applied to the cell degrees of freedom.
    #[arg(long, value_name = "FLOAT", default_value_t = 1000.0)]
    pub cell_factor: f64,

    /// Randomly displace atoms by up to this amplitude (Å) before relaxing.
    #[arg(long, value_name = "FLOAT")]
    pub rattle: Option<f64>,

    /// Trajectory destination (extended XYZ, one frame per step).
    #[arg(long, value_name = "PATH", default_value = "relax.traj")]
    pub traj_file: PathBuf,

    /// Disable trajectory recording.
    #[arg(long)]
    pub no_traj: bool,

    /// Restrict cell relaxation to isotropic scaling.
    #[arg(long)]
    pub hydrostatic_strain: bool,

    /// Keep the cell volume fixed while relaxing its shape.
    #[arg(long, conflicts_with = "hydrostatic_strain")]
    pub constant_volume: bool,

    /// External pressure added to the stress (eV/Å³).
    #[arg(long, value_name = "FLOAT", default_value_t = 0.0)]
    pub pressure: f64,
}

/// Arguments for the `phonon` subcommand.
#[derive(Args, Debug)]
pub struct PhononArgs {
    /// Path to the input structure in POSCAR format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Backend tag: matgl, m3gnet, chgnet, or deepmd.
    #[arg(short, long, value_name = "TAG", default_value = "chgnet")]
    pub backend: String,

    /// Relax the structure before the phonon run.
    #[arg(long)]
    pub relax: bool,

    /// Skip rendering the band-structure figure.
    #[arg(long)]
    pub no_plot: bool,

    /// High-symmetry points as comma-separated fractional coordinates,
    /// e.g. --kvector 0,0,0 --kvector 0.5,0,0
    #[arg(long = "kvector", value_name = "KX,KY,KZ")]
    pub kvectors: Vec<String>,

    /// Labels for the high-symmetry points, one per --kvector.
    #[arg(long = "kname", value_name = "LABEL")]
    pub knames: Vec<String>,

    /// Samples per path segment.
    #[arg(long, value_name = "INT", default_value_t = 100)]
    pub npoints: usize,

    /// Figure destination.
    #[arg(long, value_name = "PATH", default_value = "phonon.png")]
    pub figname: PathBuf,

    /// Band-structure CSV destination.
    #[arg(long, value_name = "PATH", default_value = "phonon_band.csv")]
    pub band_file: PathBuf,

    /// Supercell repetitions along the three lattice vectors.
    #[arg(long, value_name = "INT", num_args = 3)]
    pub ndim: Option<Vec<usize>>,

    /// Finite-displacement distance (Å).
    #[arg(long, value_name = "FLOAT")]
    pub distance: Option<f64>,

    /// Symmetry tolerance for the dynamical-matrix settings.
    #[arg(long, value_name = "FLOAT")]
    pub symprec: Option<f64>,

    /// Skip the force-constant symmetrization.
    #[arg(long)]
    pub no_fc_symmetry: bool,
}

/// Arguments for the `gap` subcommand.
#[derive(Args, Debug)]
pub struct GapArgs {
    /// Path to the input structure in POSCAR format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Exchange-correlation fidelity: PBE, GLLB-SC, HSE, or SCAN.
    #[arg(short, long, value_name = "LABEL", default_value = "PBE")]
    pub xc: String,
}
