// field.rs — Optical field container and the `.df` on-disk format.
//
// RESPONSIBILITIES
// ─────────────────
// 1. `Complex` — one optical-field sample, a plain (re, im) pair with the
//    exact memory layout the GPU writes back (`vec2<f32>` in WGSL).
//
// 2. `OpticalField` — a row-major 2D grid of complex samples plus the
//    physical metadata (wavelength, sample pitch) every renderer needs.
//    Renderers ACCUMULATE into the grid; they never zero it. Call
//    `zero()` before a fresh render.
//
// 3. `.df` container I/O — a fixed little-endian binary layout consumed
//    by downstream holography tooling. The header field order is a
//    persisted external contract and must not be rearranged.
//
// FILE LAYOUT (66-byte header, then the body)
//
//   u8   4              header tag length
//   [u8] "DFHD"         header tag
//   f64  wavelength
//   f64  h_pitch
//   f64  v_pitch
//   u64  h_res          (cols)
//   u64  v_res          (rows)
//   f64  center_x       (always 0)
//   f64  center_y       (always 0)
//   u8   4              body tag length
//   [u8] "DFBF"|"DFPT"  body precision: f32 pairs | f64 pairs
//   body: h_res * v_res interleaved (re, im) pairs
//
// This crate renders in f32 and writes "DFBF"; `load` accepts both body
// precisions and converts f64 down on read.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::ops::{Add, AddAssign};
use std::path::Path;

// ---------------------------------------------------------------------------
// Complex
// ---------------------------------------------------------------------------

/// One optical-field sample.
///
/// `#[repr(C)]` + `Pod` so a `&[Complex]` slice casts byte-for-byte to the
/// buffer layout the compute kernels produce.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Complex {
    pub re: f32,
    pub im: f32,
}

impl Complex {
    pub const ZERO: Complex = Complex { re: 0.0, im: 0.0 };

    pub fn new(re: f32, im: f32) -> Self {
        Complex { re, im }
    }

    /// Unit phasor `e^{i·phi}` — one spherical-wave contribution.
    pub fn from_phase(phi: f64) -> Self {
        Complex {
            re: phi.cos() as f32,
            im: phi.sin() as f32,
        }
    }

    /// Magnitude (amplitude of the sample).
    pub fn abs(self) -> f32 {
        (self.re * self.re + self.im * self.im).sqrt()
    }

    /// Argument (phase) in (-π, π].
    pub fn arg(self) -> f32 {
        self.im.atan2(self.re)
    }
}

impl Add for Complex {
    type Output = Complex;

    fn add(self, rhs: Complex) -> Complex {
        Complex {
            re: self.re + rhs.re,
            im: self.im + rhs.im,
        }
    }
}

impl AddAssign for Complex {
    fn add_assign(&mut self, rhs: Complex) {
        self.re += rhs.re;
        self.im += rhs.im;
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {:+}i)", self.re, self.im)
    }
}

// ---------------------------------------------------------------------------
// OpticalField
// ---------------------------------------------------------------------------

/// A row-major 2D grid of complex samples with physical metadata.
///
/// The grid is centered on the optical axis: the sample at `(row, col)`
/// sits at world position
/// `(corner_x + col·pitch, corner_y + row·pitch, hologram_z)` where
/// `corner_x = -(cols-1)·pitch/2` and `corner_y = -(rows-1)·pitch/2`.
///
/// Renderers add into the samples; nothing here zeroes them implicitly.
#[derive(Debug)]
pub struct OpticalField {
    samples: Vec<Complex>,
    rows: usize,
    cols: usize,
    wavelength: f64,
    pitch: f64,
}

impl Clone for OpticalField {
    // Deep copy of the sample grid — potentially large.
    fn clone(&self) -> Self {
        OpticalField {
            samples: self.samples.clone(),
            rows: self.rows,
            cols: self.cols,
            wavelength: self.wavelength,
            pitch: self.pitch,
        }
    }
}

impl OpticalField {
    /// Create a zero-initialized field.
    pub fn new(rows: usize, cols: usize, wavelength: f64, pitch: f64) -> Self {
        OpticalField {
            samples: vec![Complex::ZERO; rows * cols],
            rows,
            cols,
            wavelength,
            pitch,
        }
    }

    // --- Dimensions & metadata ---

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of samples (`rows * cols`).
    pub fn size(&self) -> usize {
        self.samples.len()
    }

    /// Size of the sample grid in bytes.
    pub fn byte_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<Complex>()
    }

    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Wave number `k = 2π/λ`.
    pub fn wave_number(&self) -> f64 {
        2.0 * std::f64::consts::PI / self.wavelength
    }

    /// World x of the leftmost sample column: `-(cols-1)·pitch/2`.
    pub fn corner_x(&self) -> f64 {
        -((self.cols as f64 - 1.0) * self.pitch) / 2.0
    }

    /// World y of the topmost sample row: `-(rows-1)·pitch/2`.
    pub fn corner_y(&self) -> f64 {
        -((self.rows as f64 - 1.0) * self.pitch) / 2.0
    }

    // --- Sample access ---

    /// # Panics
    /// Panics if `row >= rows` or `col >= cols`.
    pub fn sample(&self, row: usize, col: usize) -> Complex {
        assert!(row < self.rows && col < self.cols);
        self.samples[row * self.cols + col]
    }

    /// # Panics
    /// Panics if `row >= rows` or `col >= cols`.
    pub fn sample_mut(&mut self, row: usize, col: usize) -> &mut Complex {
        assert!(row < self.rows && col < self.cols);
        &mut self.samples[row * self.cols + col]
    }

    /// Flat row-major sample slice.
    pub fn samples(&self) -> &[Complex] {
        &self.samples
    }

    /// Flat row-major mutable sample slice. Chunked readback writes here
    /// at the chunk's element offset.
    pub fn samples_mut(&mut self) -> &mut [Complex] {
        &mut self.samples
    }

    /// Reset every sample to zero. Call before a fresh render.
    pub fn zero(&mut self) {
        self.samples.fill(Complex::ZERO);
    }

    // --- Persistence ---

    /// Save to a `.df` file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FieldIoError> {
        let file = File::create(path)?;
        self.save_to(&mut BufWriter::new(file))
    }

    /// Write the `.df` layout to an arbitrary writer.
    pub fn save_to(&self, w: &mut impl Write) -> Result<(), FieldIoError> {
        w.write_all(&[HEADER_TAG.len() as u8])?;
        w.write_all(HEADER_TAG)?;
        w.write_all(&self.wavelength.to_le_bytes())?;
        w.write_all(&self.pitch.to_le_bytes())?; // h_pitch
        w.write_all(&self.pitch.to_le_bytes())?; // v_pitch
        w.write_all(&(self.cols as u64).to_le_bytes())?;
        w.write_all(&(self.rows as u64).to_le_bytes())?;
        w.write_all(&0f64.to_le_bytes())?; // center_x
        w.write_all(&0f64.to_le_bytes())?; // center_y
        w.write_all(&[BODY_TAG_F32.len() as u8])?;
        w.write_all(BODY_TAG_F32)?;

        for s in &self.samples {
            w.write_all(&s.re.to_le_bytes())?;
            w.write_all(&s.im.to_le_bytes())?;
        }

        w.flush()?;
        Ok(())
    }

    /// Load from a `.df` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FieldIoError> {
        let file = File::open(path)?;
        Self::load_from(&mut BufReader::new(file))
    }

    /// Read the `.df` layout from an arbitrary reader.
    ///
    /// Accepts both body precisions; `DFPT` (f64) samples are converted
    /// down to f32 on read.
    pub fn load_from(r: &mut impl Read) -> Result<Self, FieldIoError> {
        let tag = read_tag(r)?;
        if tag != *HEADER_TAG {
            return Err(FieldIoError::BadHeaderTag(tag));
        }

        let wavelength = read_f64(r)?;
        let h_pitch = read_f64(r)?;
        let _v_pitch = read_f64(r)?;
        let cols = read_u64(r)?;
        let rows = read_u64(r)?;
        let _center_x = read_f64(r)?;
        let _center_y = read_f64(r)?;

        // The resolutions are untrusted input; a corrupt header must not
        // drive the allocation below. Reject anything whose product
        // overflows or exceeds the load ceiling.
        match rows.checked_mul(cols) {
            Some(n) if n <= MAX_LOAD_SAMPLES => {}
            _ => return Err(FieldIoError::BadDimensions { rows, cols }),
        }
        let (rows, cols) = (rows as usize, cols as usize);

        let body_tag = read_tag(r)?;
        let double_precision = match &body_tag {
            t if *t == *BODY_TAG_F32 => false,
            t if *t == *BODY_TAG_F64 => true,
            _ => return Err(FieldIoError::BadBodyTag(body_tag)),
        };

        let mut field = OpticalField::new(rows, cols, wavelength, h_pitch);
        for s in field.samples.iter_mut() {
            if double_precision {
                s.re = read_f64(r)? as f32;
                s.im = read_f64(r)? as f32;
            } else {
                s.re = read_f32(r)?;
                s.im = read_f32(r)?;
            }
        }

        Ok(field)
    }
}

const HEADER_TAG: &[u8; 4] = b"DFHD";

/// Largest grid `load_from` will allocate: 2³⁰ samples (8 GiB of f32
/// pairs), comfortably above any real display resolution.
const MAX_LOAD_SAMPLES: u64 = 1 << 30;
const BODY_TAG_F32: &[u8; 4] = b"DFBF";
const BODY_TAG_F64: &[u8; 4] = b"DFPT";

/// Read a length-prefixed 4-byte tag, rejecting any other length.
fn read_tag(r: &mut impl Read) -> Result<[u8; 4], FieldIoError> {
    let mut len = [0u8; 1];
    r.read_exact(&mut len)?;
    if len[0] != 4 {
        return Err(FieldIoError::BadTagLength(len[0]));
    }
    let mut tag = [0u8; 4];
    r.read_exact(&mut tag)?;
    Ok(tag)
}

fn read_f32(r: &mut impl Read) -> Result<f32, FieldIoError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_f64(r: &mut impl Read) -> Result<f64, FieldIoError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> Result<u64, FieldIoError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from `.df` save/load.
#[derive(Debug)]
pub enum FieldIoError {
    /// Underlying read/write failure (also covers truncated files,
    /// surfaced as `UnexpectedEof`).
    Io(io::Error),
    /// Tag length byte was not 4.
    BadTagLength(u8),
    /// Header tag was not "DFHD".
    BadHeaderTag([u8; 4]),
    /// Body tag was neither "DFBF" nor "DFPT".
    BadBodyTag([u8; 4]),
    /// Header resolutions describe an implausibly large grid.
    BadDimensions { rows: u64, cols: u64 },
}

impl fmt::Display for FieldIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldIoError::Io(e) => write!(f, "optical field I/O failed: {e}"),
            FieldIoError::BadTagLength(n) => {
                write!(f, "bad tag length {n} (expected 4) — not a .df file?")
            }
            FieldIoError::BadHeaderTag(t) => {
                write!(f, "bad header tag {:?} (expected \"DFHD\")", String::from_utf8_lossy(t))
            }
            FieldIoError::BadBodyTag(t) => {
                write!(f, "bad body tag {:?} (expected \"DFBF\" or \"DFPT\")", String::from_utf8_lossy(t))
            }
            FieldIoError::BadDimensions { rows, cols } => {
                write!(f, "implausible field resolution {cols}x{rows} in header")
            }
        }
    }
}

impl std::error::Error for FieldIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FieldIoError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FieldIoError {
    fn from(e: io::Error) -> Self {
        FieldIoError::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
