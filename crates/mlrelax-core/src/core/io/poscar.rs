use super::StructureIoError;
use crate::core::models::atoms::AtomicSystem;
use nalgebra::{Matrix3, Vector3};
use std::fs;
use std::io::Write;
use std::path::Path;

fn parse_err(line: usize, message: impl Into<String>) -> StructureIoError {
    StructureIoError::Parse {
        line,
        message: message.into(),
    }
}

fn parse_f64(token: &str, line: usize) -> Result<f64, StructureIoError> {
    token
        .parse::<f64>()
        .map_err(|_| parse_err(line, format!("expected a number, got '{token}'")))
}

/// Reads a VASP 5 POSCAR file (symbol line + count line, Direct or Cartesian
/// coordinates, optional Selective dynamics block).
pub fn read(path: &Path) -> Result<AtomicSystem, StructureIoError> {
    let content = fs::read_to_string(path)?;
    parse(&content)
}

/// Parses POSCAR text. The first line is a free-form comment.
pub fn parse(content: &str) -> Result<AtomicSystem, StructureIoError> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() < 8 {
        return Err(parse_err(lines.len(), "truncated POSCAR"));
    }

    let scale = parse_f64(lines[1].trim(), 2)?;

    let mut cell = Matrix3::zeros();
    for (i, line) in lines[2..5].iter().enumerate() {
        let row: Vec<f64> = line
            .split_whitespace()
            .map(|t| parse_f64(t, 3 + i))
            .collect::<Result<_, _>>()?;
        if row.len() != 3 {
            return Err(parse_err(3 + i, "lattice vector needs three components"));
        }
        cell.set_row(i, &nalgebra::RowVector3::new(row[0], row[1], row[2]));
    }
    cell *= scale;

    let symbols: Vec<&str> = lines[5].split_whitespace().collect();
    if symbols.is_empty() {
        return Err(parse_err(6, "missing species symbols"));
    }
    let counts: Vec<usize> = lines[6]
        .split_whitespace()
        .map(|t| {
            t.parse::<usize>()
                .map_err(|_| parse_err(7, format!("expected an atom count, got '{t}'")))
        })
        .collect::<Result<_, _>>()?;
    if counts.len() != symbols.len() {
        return Err(parse_err(7, "species and count lines differ in length"));
    }
    let total: usize = counts.iter().sum();

    let mut cursor = 7;
    if lines[cursor].trim_start().starts_with(['S', 's']) {
        cursor += 1; // Selective dynamics flags are ignored
    }
    let mode = lines
        .get(cursor)
        .ok_or_else(|| parse_err(lines.len(), "truncated POSCAR"))?;
    let direct = match mode.trim_start().chars().next() {
        Some('D') | Some('d') => true,
        Some('C') | Some('c') | Some('K') | Some('k') => false,
        _ => return Err(parse_err(cursor + 1, "expected 'Direct' or 'Cartesian'")),
    };
    cursor += 1;

    if lines.len() < cursor + total {
        return Err(parse_err(lines.len(), "fewer coordinate lines than atoms"));
    }

    let mut species = Vec::with_capacity(total);
    for (symbol, count) in symbols.iter().zip(&counts) {
        species.extend(std::iter::repeat_n(symbol.to_string(), *count));
    }

    let mut positions = Vec::with_capacity(total);
    for (i, line) in lines[cursor..cursor + total].iter().enumerate() {
        let coords: Vec<f64> = line
            .split_whitespace()
            .take(3)
            .map(|t| parse_f64(t, cursor + i + 1))
            .collect::<Result<_, _>>()?;
        if coords.len() != 3 {
            return Err(parse_err(cursor + i + 1, "coordinate needs three components"));
        }
        let v = Vector3::new(coords[0], coords[1], coords[2]);
        positions.push(if direct { cell.transpose() * v } else { v * scale });
    }

    Ok(AtomicSystem::new(species, positions, cell)?)
}

/// Writes a system as a VASP 5 POSCAR file in Direct coordinates,
/// overwriting any existing file.
pub fn write(system: &AtomicSystem, path: &Path) -> Result<(), StructureIoError> {
    let mut out = String::new();
    render(system, &mut out)?;
    let mut file = fs::File::create(path)?;
    file.write_all(out.as_bytes())?;
    Ok(())
}

fn render(system: &AtomicSystem, out: &mut String) -> Result<(), StructureIoError> {
    use std::fmt::Write as _;

    // Group consecutive identical symbols into species/count lines.
    let mut groups: Vec<(String, usize)> = Vec::new();
    for symbol in system.species() {
        match groups.last_mut() {
            Some((s, n)) if s == symbol => *n += 1,
            _ => groups.push((symbol.clone(), 1)),
        }
    }

    let _ = writeln!(out, "{}", groups.iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>().join(" "));
    let _ = writeln!(out, "1.0");
    let cell = system.cell();
    for i in 0..3 {
        let _ = writeln!(out, "  {:18.12}  {:18.12}  {:18.12}", cell[(i, 0)], cell[(i, 1)], cell[(i, 2)]);
    }
    let _ = writeln!(out, "{}", groups.iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>().join(" "));
    let _ = writeln!(out, "{}", groups.iter().map(|(_, n)| n.to_string()).collect::<Vec<_>>().join(" "));
    let _ = writeln!(out, "Direct");
    for frac in system.fractional_positions()? {
        let _ = writeln!(out, "  {:18.12}  {:18.12}  {:18.12}", frac.x, frac.y, frac.z);
    }
    Ok(())
}
