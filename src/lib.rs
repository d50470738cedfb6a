// holoren: HOLOgram RENderer
// GPU-accelerated computer-generated holography: spherical-wave
// summation over point-cloud scenes, chunked to fit device memory.
//
// The CPU renderer in `cpu` is the authoritative reference; every GPU
// algorithm in `gpu` is validated against it sample by sample.

pub mod cloud;
pub mod cpu;
pub mod field;
pub mod gpu;

pub use cloud::{PointCloud, PointSource};
pub use cpu::CpuRenderer;
pub use field::{Complex, OpticalField};
pub use gpu::render::{GpuRenderer, RendererConfig};
pub use gpu::RenderAlgorithm;
