// cloud.rs — Point-cloud scene container and the `.pc` text format.
//
// Responsibilities:
//   - `PointSource` — one monochromatic point light source. `#[repr(C)]` +
//     `Pod` so the dense device upload is a byte-for-byte cast of the
//     host slice (3 floats per point, no padding).
//   - `PointCloud` — append-only contiguous container; renderers iterate
//     it, the marshaller casts it.
//   - `.pc` reader/writer — one `x, y, z` line per point, comma
//     separated, whitespace tolerant, blank lines skipped. Parse errors
//     carry the 1-based line number.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// One point light source, in meters, world coordinates.
///
/// The hologram plane sits at z = 0 with sources in front of it
/// (typically negative z in the scene files, positive hologram z at
/// render time).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointSource {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl PointSource {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        PointSource { x, y, z }
    }
}

impl fmt::Display for PointSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// An append-only collection of point sources backed by contiguous
/// storage.
#[derive(Debug, Default, Clone)]
pub struct PointCloud {
    points: Vec<PointSource>,
}

impl PointCloud {
    pub fn new() -> Self {
        PointCloud { points: Vec::new() }
    }

    pub fn with_capacity(n: usize) -> Self {
        PointCloud {
            points: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, p: PointSource) {
        self.points.push(p);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Contiguous point slice — this is what gets cast and uploaded.
    pub fn points(&self) -> &[PointSource] {
        &self.points
    }

    /// Size of the dense (tightly packed, 3 floats per point) layout.
    pub fn byte_size(&self) -> usize {
        self.points.len() * std::mem::size_of::<PointSource>()
    }

    // --- Persistence ---

    /// Load a `.pc` text file.
    pub fn load_pc(path: impl AsRef<Path>) -> Result<Self, CloudIoError> {
        let file = File::open(path)?;
        Self::load_pc_from(BufReader::new(file))
    }

    /// Parse the `.pc` format from an arbitrary reader.
    pub fn load_pc_from(r: impl BufRead) -> Result<Self, CloudIoError> {
        let mut cloud = PointCloud::new();

        for (idx, line) in r.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let lineno = idx + 1;
            let mut fields = line.split(',');
            let x = parse_coord(fields.next(), lineno)?;
            let y = parse_coord(fields.next(), lineno)?;
            let z = parse_coord(fields.next(), lineno)?;
            if fields.next().is_some() {
                return Err(CloudIoError::Parse {
                    line: lineno,
                    what: "more than 3 coordinates".to_string(),
                });
            }

            cloud.push(PointSource::new(x, y, z));
        }

        Ok(cloud)
    }

    /// Save as a `.pc` text file.
    pub fn save_pc(&self, path: impl AsRef<Path>) -> Result<(), CloudIoError> {
        let file = File::create(path)?;
        self.save_pc_to(&mut BufWriter::new(file))
    }

    /// Write the `.pc` format to an arbitrary writer.
    pub fn save_pc_to(&self, w: &mut impl Write) -> Result<(), CloudIoError> {
        for p in &self.points {
            writeln!(w, "{}, {}, {}", p.x, p.y, p.z)?;
        }
        w.flush()?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a PointSource;
    type IntoIter = std::slice::Iter<'a, PointSource>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

fn parse_coord(field: Option<&str>, lineno: usize) -> Result<f32, CloudIoError> {
    let text = field.ok_or_else(|| CloudIoError::Parse {
        line: lineno,
        what: "fewer than 3 coordinates".to_string(),
    })?;
    text.trim().parse::<f32>().map_err(|_| CloudIoError::Parse {
        line: lineno,
        what: format!("bad coordinate {:?}", text.trim()),
    })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from `.pc` save/load.
#[derive(Debug)]
pub enum CloudIoError {
    Io(io::Error),
    /// Malformed line; `line` is 1-based.
    Parse { line: usize, what: String },
}

impl fmt::Display for CloudIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudIoError::Io(e) => write!(f, "point cloud I/O failed: {e}"),
            CloudIoError::Parse { line, what } => {
                write!(f, "point cloud parse error at line {line}: {what}")
            }
        }
    }
}

impl std::error::Error for CloudIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CloudIoError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CloudIoError {
    fn from(e: io::Error) -> Self {
        CloudIoError::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_source_is_tightly_packed() {
        // The dense upload layout depends on this.
        assert_eq!(std::mem::size_of::<PointSource>(), 12);
        let pts = [
            PointSource::new(1.0, 2.0, 3.0),
            PointSource::new(4.0, 5.0, 6.0),
        ];
        let floats: &[f32] = bytemuck::cast_slice(&pts);
        assert_eq!(floats, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn parse_basic() {
        let text = "0.0, 0.0, -0.1\n1e-3, -2e-3, -0.2\n";
        let cloud = PointCloud::load_pc_from(text.as_bytes()).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.points()[0], PointSource::new(0.0, 0.0, -0.1));
        assert_eq!(cloud.points()[1], PointSource::new(1e-3, -2e-3, -0.2));
    }

    #[test]
    fn parse_tolerates_whitespace_and_blank_lines() {
        let text = "\n  1 ,2,  3  \n\n   \n4,5,6\n";
        let cloud = PointCloud::load_pc_from(text.as_bytes()).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.points()[0], PointSource::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn parse_error_reports_line_number() {
        let text = "1, 2, 3\n4, five, 6\n";
        let err = PointCloud::load_pc_from(text.as_bytes()).unwrap_err();
        match err {
            CloudIoError::Parse { line, ref what } => {
                assert_eq!(line, 2);
                assert!(what.contains("five"), "{what}");
            }
            other => panic!("expected Parse, got {other}"),
        }
    }

    #[test]
    fn parse_rejects_wrong_arity() {
        let err = PointCloud::load_pc_from("1, 2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CloudIoError::Parse { line: 1, .. }), "{err}");

        let err = PointCloud::load_pc_from("1, 2, 3, 4\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CloudIoError::Parse { line: 1, .. }), "{err}");
    }

    #[test]
    fn save_load_round_trip_in_memory() {
        let mut cloud = PointCloud::new();
        cloud.push(PointSource::new(0.5, -0.25, -0.125));
        cloud.push(PointSource::new(1e-6, 2e-6, -3e-2));

        let mut buf = Vec::new();
        cloud.save_pc_to(&mut buf).unwrap();
        let loaded = PointCloud::load_pc_from(buf.as_slice()).unwrap();
        assert_eq!(loaded.points(), cloud.points());
    }

    #[test]
    fn byte_size_counts_dense_layout() {
        let mut cloud = PointCloud::new();
        assert_eq!(cloud.byte_size(), 0);
        cloud.push(PointSource::default());
        cloud.push(PointSource::default());
        assert_eq!(cloud.byte_size(), 24);
    }
}
