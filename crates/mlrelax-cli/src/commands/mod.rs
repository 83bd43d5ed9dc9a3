pub mod gap;
pub mod phonon;
pub mod relax;
