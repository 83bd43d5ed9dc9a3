use super::StructureIoError;
use crate::core::models::atoms::AtomicSystem;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Multi-frame extended-XYZ trajectory writer.
///
/// Opening truncates any existing file at the same path; one frame is appended
/// per call to [`TrajectoryWriter::write_frame`].
pub struct TrajectoryWriter {
    writer: BufWriter<File>,
    frames: usize,
}

impl TrajectoryWriter {
    pub fn create(path: &Path) -> Result<Self, StructureIoError> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            frames: 0,
        })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Appends one frame, optionally carrying the potential energy in the
    /// comment line.
    pub fn write_frame(
        &mut self,
        system: &AtomicSystem,
        energy: Option<f64>,
    ) -> Result<(), StructureIoError> {
        let cell = system.cell();
        writeln!(self.writer, "{}", system.len())?;
        write!(
            self.writer,
            "Lattice=\"{:.10} {:.10} {:.10} {:.10} {:.10} {:.10} {:.10} {:.10} {:.10}\" Properties=species:S:1:pos:R:3",
            cell[(0, 0)], cell[(0, 1)], cell[(0, 2)],
            cell[(1, 0)], cell[(1, 1)], cell[(1, 2)],
            cell[(2, 0)], cell[(2, 1)], cell[(2, 2)],
        )?;
        match energy {
            Some(e) => writeln!(self.writer, " energy={e:.10}")?,
            None => writeln!(self.writer)?,
        }
        for (symbol, pos) in system.species().iter().zip(system.positions()) {
            writeln!(
                self.writer,
                "{symbol} {:.10} {:.10} {:.10}",
                pos.x, pos.y, pos.z
            )?;
        }
        self.writer.flush()?;
        self.frames += 1;
        Ok(())
    }
}
