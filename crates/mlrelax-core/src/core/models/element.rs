use phf::phf_map;

/// Static per-element reference data.
///
/// Masses are in atomic mass units, covalent radii in Ångström
/// (Cordero et al., single-bond values).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementData {
    pub number: u8,
    pub mass: f64,
    pub covalent_radius: f64,
}

macro_rules! el {
    ($z:expr, $m:expr, $r:expr) => {
        ElementData {
            number: $z,
            mass: $m,
            covalent_radius: $r,
        }
    };
}

static ELEMENTS: phf::Map<&'static str, ElementData> = phf_map! {
    "H" => el!(1, 1.008, 0.31),
    "He" => el!(2, 4.0026, 0.28),
    "Li" => el!(3, 6.94, 1.28),
    "Be" => el!(4, 9.0122, 0.96),
    "B" => el!(5, 10.81, 0.84),
    "C" => el!(6, 12.011, 0.76),
    "N" => el!(7, 14.007, 0.71),
    "O" => el!(8, 15.999, 0.66),
    "F" => el!(9, 18.998, 0.57),
    "Ne" => el!(10, 20.180, 0.58),
    "Na" => el!(11, 22.990, 1.66),
    "Mg" => el!(12, 24.305, 1.41),
    "Al" => el!(13, 26.982, 1.21),
    "Si" => el!(14, 28.085, 1.11),
    "P" => el!(15, 30.974, 1.07),
    "S" => el!(16, 32.06, 1.05),
    "Cl" => el!(17, 35.45, 1.02),
    "Ar" => el!(18, 39.948, 1.06),
    "K" => el!(19, 39.098, 2.03),
    "Ca" => el!(20, 40.078, 1.76),
    "Sc" => el!(21, 44.956, 1.70),
    "Ti" => el!(22, 47.867, 1.60),
    "V" => el!(23, 50.942, 1.53),
    "Cr" => el!(24, 51.996, 1.39),
    "Mn" => el!(25, 54.938, 1.39),
    "Fe" => el!(26, 55.845, 1.32),
    "Co" => el!(27, 58.933, 1.26),
    "Ni" => el!(28, 58.693, 1.24),
    "Cu" => el!(29, 63.546, 1.32),
    "Zn" => el!(30, 65.38, 1.22),
    "Ga" => el!(31, 69.723, 1.22),
    "Ge" => el!(32, 72.630, 1.20),
    "As" => el!(33, 74.922, 1.19),
    "Se" => el!(34, 78.971, 1.20),
    "Br" => el!(35, 79.904, 1.20),
    "Kr" => el!(36, 83.798, 1.16),
    "Rb" => el!(37, 85.468, 2.20),
    "Sr" => el!(38, 87.62, 1.95),
    "Y" => el!(39, 88.906, 1.90),
    "Zr" => el!(40, 91.224, 1.75),
    "Nb" => el!(41, 92.906, 1.64),
    "Mo" => el!(42, 95.95, 1.54),
    "Tc" => el!(43, 98.0, 1.47),
    "Ru" => el!(44, 101.07, 1.46),
    "Rh" => el!(45, 102.91, 1.42),
    "Pd" => el!(46, 106.42, 1.39),
    "Ag" => el!(47, 107.87, 1.45),
    "Cd" => el!(48, 112.41, 1.44),
    "In" => el!(49, 114.82, 1.42),
    "Sn" => el!(50, 118.71, 1.39),
    "Sb" => el!(51, 121.76, 1.39),
    "Te" => el!(52, 127.60, 1.38),
    "I" => el!(53, 126.90, 1.39),
    "Xe" => el!(54, 131.29, 1.40),
    "Cs" => el!(55, 132.91, 2.44),
    "Ba" => el!(56, 137.33, 2.15),
    "La" => el!(57, 138.91, 2.07),
    "Hf" => el!(72, 178.49, 1.75),
    "Ta" => el!(73, 180.95, 1.70),
    "W" => el!(74, 183.84, 1.62),
    "Re" => el!(75, 186.21, 1.51),
    "Os" => el!(76, 190.23, 1.44),
    "Ir" => el!(77, 192.22, 1.41),
    "Pt" => el!(78, 195.08, 1.36),
    "Au" => el!(79, 196.97, 1.36),
    "Hg" => el!(80, 200.59, 1.32),
    "Tl" => el!(81, 204.38, 1.45),
    "Pb" => el!(82, 207.2, 1.46),
    "Bi" => el!(83, 208.98, 1.48),
};

/// Looks up static data for a chemical symbol.
pub fn lookup(symbol: &str) -> Option<&'static ElementData> {
    ELEMENTS.get(symbol)
}

/// Atomic number for a chemical symbol, if known.
pub fn atomic_number(symbol: &str) -> Option<u8> {
    lookup(symbol).map(|e| e.number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_returns_data_for_known_symbols() {
        let si = lookup("Si").unwrap();
        assert_eq!(si.number, 14);
        assert!((si.mass - 28.085).abs() < 1e-9);
    }

    #[test]
    fn lookup_is_case_sensitive_and_rejects_unknown_symbols() {
        assert!(lookup("si").is_none());
        assert!(lookup("Xx").is_none());
    }

    #[test]
    fn atomic_number_matches_periodic_table() {
        assert_eq!(atomic_number("H"), Some(1));
        assert_eq!(atomic_number("Cs"), Some(55));
        assert_eq!(atomic_number("Pb"), Some(82));
    }
}
