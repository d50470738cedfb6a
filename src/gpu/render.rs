// gpu/render.rs — chunk planning and the dispatch/readback loop.
//
// CHUNKING:
// The field can be bigger than the largest buffer the device will bind.
// `ChunkPlan` partitions the flat sample range [0, N) into contiguous
// chunks; one output buffer sized to a single chunk is created up front
// and reused by every dispatch. After each dispatch the chunk is read
// back and ADDED into the field at its element offset — the field is
// an accumulator, never overwritten.
//
// Chunk size policy: derive from the allocation ceiling unless the
// caller overrides it, clamp to the field, clamp to the widest 1D
// dispatch the device accepts, and reject zero.
//
// ARGUMENT SPLIT:
// Everything that is constant for a render (point count, field
// geometry, wave number, hologram z) goes into the `WaveParams` uniform,
// written once. The per-chunk (offset, len) pair lives in its own
// 16-byte `ChunkArgs` uniform rewritten before each submit. SinglePass
// has no chunk-varying state and binds no chunk uniform.
//
// Debug builds poll the device to completion after every dispatch so a
// kernel fault is attributed to the chunk that caused it.

use std::fmt;
use std::sync::mpsc;

use wgpu::util::DeviceExt;

use crate::cloud::PointCloud;
use crate::field::{Complex, OpticalField};
use crate::gpu::marshal::{self, SAMPLE_BYTES};
use crate::gpu::session::{
    Session, SessionError, BIND_CHUNK, BIND_PARAMS, BIND_POINTS_ALIGNED, BIND_POINTS_DENSE,
    BIND_WAVE_OUT,
};
use crate::gpu::RenderAlgorithm;

// Workgroup shapes; must match the @workgroup_size attributes in
// wave.wgsl.
const WG_MULTI: u32 = 128;
const WG_SINGLE_X: u32 = 16;
const WG_SINGLE_Y: u32 = 8;

// ---------------------------------------------------------------------------
// Uniforms (must match the WGSL structs exactly)
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct WaveParams {
    point_count: u32,
    rows:        u32,
    cols:        u32,
    _pad0:       u32,
    k:           f32,
    pitch:       f32,
    corner_x:    f32,
    corner_y:    f32,
    hologram_z:  f32,
    _pad1:       f32,
    _pad2:       f32,
    _pad3:       f32,
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ChunkArgs {
    offset: u32,
    len:    u32,
    _pad0:  u32,
    _pad1:  u32,
}

// ---------------------------------------------------------------------------
// Chunk planning
// ---------------------------------------------------------------------------

/// A partition of the flat sample range [0, N) into contiguous chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total: usize,
    chunk: usize,
}

impl ChunkPlan {
    /// Apply the chunk-size policy.
    ///
    /// The chunk size starts from `chunk_override` when given, otherwise
    /// from how many samples fit in `max_alloc_bytes`. It is then
    /// clamped to the allocation ceiling (an override cannot ask for a
    /// buffer the device will refuse to create), to the field, and to
    /// `dispatch_cap` (the widest 1D dispatch the device accepts, in
    /// elements). A chunk of zero elements is an error, not an infinite
    /// loop.
    pub fn new(
        field_elements: usize,
        chunk_override: Option<usize>,
        max_alloc_bytes: u64,
        dispatch_cap: usize,
    ) -> Result<ChunkPlan, RenderError> {
        let derived = (max_alloc_bytes as usize) / SAMPLE_BYTES;
        let mut chunk = chunk_override.unwrap_or(derived);
        chunk = chunk.min(derived).min(field_elements).min(dispatch_cap);
        if chunk == 0 {
            return Err(RenderError::ZeroChunk {
                field_elements,
                max_alloc_bytes,
            });
        }
        Ok(ChunkPlan {
            total: field_elements,
            chunk,
        })
    }

    /// One chunk covering the whole field (SinglePass).
    pub fn whole_field(field_elements: usize) -> ChunkPlan {
        ChunkPlan {
            total: field_elements,
            chunk: field_elements,
        }
    }

    pub fn chunk_elements(&self) -> usize {
        self.chunk
    }

    pub fn chunk_count(&self) -> usize {
        if self.total == 0 {
            0
        } else {
            (self.total + self.chunk - 1) / self.chunk
        }
    }

    /// `(offset, len)` pairs covering [0, total) exactly once, in order.
    /// Every `len` is `chunk_elements()` except possibly the last.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let (total, chunk) = (self.total, self.chunk);
        (0..total)
            .step_by(chunk.max(1))
            .map(move |offset| (offset, chunk.min(total - offset)))
    }
}

/// Sample offsets, chunk lengths and the point count travel to the
/// kernel as u32. Anything wider would wrap silently in the chunk
/// uniform, so it is rejected before any device work.
fn check_index_range(samples: usize, points: usize) -> Result<(), RenderError> {
    if samples > u32::MAX as usize || points > u32::MAX as usize {
        return Err(RenderError::IndexRange { samples, points });
    }
    Ok(())
}

/// SinglePass pre-flight: the whole field must fit one allocation.
/// Checked before any device work.
fn check_single_pass_fits(field_bytes: u64, max_alloc_bytes: u64) -> Result<(), RenderError> {
    if field_bytes > max_alloc_bytes {
        return Err(RenderError::FieldTooLarge {
            field_bytes,
            max_alloc_bytes,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Renderer façade
// ---------------------------------------------------------------------------

/// Renderer configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub algorithm: RenderAlgorithm,
    pub prefs: crate::gpu::catalog::SelectionPrefs,
    /// z of the hologram plane in world space (m).
    pub hologram_z: f64,
    /// Chunk size override in samples; `None` derives it from the
    /// device's allocation ceiling.
    pub chunk_elements: Option<usize>,
    /// Substitute kernel source file; `None` uses the built-in kernel.
    pub kernel_path: Option<std::path::PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        RendererConfig {
            algorithm: RenderAlgorithm::MultiPass,
            prefs: crate::gpu::catalog::SelectionPrefs::any(),
            hologram_z: 0.0,
            chunk_elements: None,
            kernel_path: None,
        }
    }
}

/// GPU hologram renderer.
///
/// Starts closed; `open()` acquires the device and compiles the kernel,
/// `render_object_wave()` accumulates the object wave into a field,
/// `close()` releases everything. Rendering while closed is an error
/// value, not a panic. `last_error()` keeps the most recent failure's
/// diagnostic text until the next failing call.
pub struct GpuRenderer {
    config: RendererConfig,
    session: Option<Session>,
    last_error: String,
}

impl GpuRenderer {
    pub fn new(config: RendererConfig) -> Self {
        GpuRenderer {
            config,
            session: None,
            last_error: String::new(),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_open)
    }

    /// Diagnostic text of the most recent failure; empty when no call
    /// has failed yet.
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    /// Acquire a device and build the pipeline. A no-op when already
    /// open.
    pub fn open(&mut self) -> Result<(), RenderError> {
        if self.is_open() {
            return Ok(());
        }
        match Session::open(
            self.config.prefs,
            self.config.algorithm,
            self.config.kernel_path.as_deref(),
        ) {
            Ok(session) => {
                self.session = Some(session);
                Ok(())
            }
            Err(e) => Err(self.record(RenderError::Session(e))),
        }
    }

    /// Release all device resources. Idempotent; a closed renderer can
    /// be reopened.
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }

    /// Accumulate the object wave of `cloud` into `field`.
    pub fn render_object_wave(
        &mut self,
        cloud: &PointCloud,
        field: &mut OpticalField,
    ) -> Result<(), RenderError> {
        match self.render_inner(cloud, field) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.record(e)),
        }
    }

    /// Turn the object wave into a recordable hologram by adding the
    /// reference wave. Not implemented yet: succeeds without touching
    /// the field so pipelines that call it keep working.
    pub fn render_hologram(&mut self, _field: &mut OpticalField) -> Result<(), RenderError> {
        if !self.is_open() {
            return Err(self.record(RenderError::NotOpen));
        }
        log::warn!("render_hologram: reference wave not implemented, field unchanged");
        Ok(())
    }

    fn record(&mut self, e: RenderError) -> RenderError {
        self.last_error = e.to_string();
        log::error!("{e}");
        e
    }

    fn render_inner(
        &self,
        cloud: &PointCloud,
        field: &mut OpticalField,
    ) -> Result<(), RenderError> {
        let session = self.session.as_ref().ok_or(RenderError::NotOpen)?;
        let parts = session.parts().ok_or(RenderError::NotOpen)?;

        // Nothing to do: zero sources contribute zero everywhere, and an
        // empty field has nowhere to accumulate.
        if cloud.is_empty() || field.size() == 0 {
            return Ok(());
        }
        check_index_range(field.size(), cloud.len())?;

        let algorithm = session.algorithm();
        let max_alloc = session.max_alloc_bytes();
        let plan = if algorithm.is_single_pass() {
            check_single_pass_fits(field.byte_size() as u64, max_alloc)?;
            ChunkPlan::whole_field(field.size())
        } else {
            let limits = parts.device.limits();
            let dispatch_cap =
                limits.max_compute_workgroups_per_dimension as usize * WG_MULTI as usize;
            ChunkPlan::new(field.size(), self.config.chunk_elements, max_alloc, dispatch_cap)?
        };
        log::debug!(
            "render: {} points into {}x{} field, {} chunk(s) of {} samples",
            cloud.len(),
            field.rows(),
            field.cols(),
            plan.chunk_count(),
            plan.chunk_elements()
        );

        let device = parts.device;
        let queue = parts.queue;

        // Fixed-argument set: uploaded once, bound once.
        let params = WaveParams {
            point_count: cloud.len() as u32,
            rows: field.rows() as u32,
            cols: field.cols() as u32,
            _pad0: 0,
            k: field.wave_number() as f32,
            pitch: field.pitch() as f32,
            corner_x: field.corner_x() as f32,
            corner_y: field.corner_y() as f32,
            hologram_z: self.config.hologram_z as f32,
            _pad1: 0.0,
            _pad2: 0.0,
            _pad3: 0.0,
        };

        // Two scopes: exhaustion surfaces as OutOfMemory, a request the
        // device refuses outright (e.g. a size beyond max_buffer_size)
        // as Validation. Either way the render call fails with a
        // diagnostic instead of tripping wgpu's uncaptured-error panic.
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let points_buf = if algorithm.uses_aligned_points() {
            marshal::upload_cloud_aligned(device, cloud)
        } else {
            marshal::upload_cloud_dense(device, cloud)
        };
        let output_buf = marshal::create_chunk_output(device, plan.chunk_elements());
        let staging_buf = marshal::create_chunk_staging(device, plan.chunk_elements());
        let params_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("wave params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let chunk_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("chunk args"),
            size: std::mem::size_of::<ChunkArgs>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let points_binding = if algorithm.uses_aligned_points() {
            BIND_POINTS_ALIGNED
        } else {
            BIND_POINTS_DENSE
        };
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: points_binding,
                resource: points_buf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: BIND_WAVE_OUT,
                resource: output_buf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: BIND_PARAMS,
                resource: params_buf.as_entire_binding(),
            },
        ];
        if !algorithm.is_single_pass() {
            entries.push(wgpu::BindGroupEntry {
                binding: BIND_CHUNK,
                resource: chunk_buf.as_entire_binding(),
            });
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("wave BG"),
            layout: parts.bind_layout,
            entries: &entries,
        });
        for filter_err in [
            pollster::block_on(device.pop_error_scope()),
            pollster::block_on(device.pop_error_scope()),
        ] {
            if let Some(err) = filter_err {
                return Err(RenderError::Device {
                    op: "buffer allocation",
                    detail: err.to_string(),
                });
            }
        }

        for (offset, len) in plan.iter() {
            if !algorithm.is_single_pass() {
                let args = ChunkArgs {
                    offset: offset as u32,
                    len: len as u32,
                    _pad0: 0,
                    _pad1: 0,
                };
                queue.write_buffer(&chunk_buf, 0, bytemuck::bytes_of(&args));
            }

            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("wave dispatch"),
            });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(algorithm.entry_point()),
                    timestamp_writes: None,
                });
                pass.set_pipeline(parts.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                if algorithm.is_single_pass() {
                    let dx = (params.cols + WG_SINGLE_X - 1) / WG_SINGLE_X;
                    let dy = (params.rows + WG_SINGLE_Y - 1) / WG_SINGLE_Y;
                    pass.dispatch_workgroups(dx, dy, 1);
                } else {
                    let dx = (len as u32 + WG_MULTI - 1) / WG_MULTI;
                    pass.dispatch_workgroups(dx, 1, 1);
                }
            }
            let copy_bytes = (len * SAMPLE_BYTES) as u64;
            encoder.copy_buffer_to_buffer(&output_buf, 0, &staging_buf, 0, copy_bytes);
            queue.submit(std::iter::once(encoder.finish()));

            // Synchronous in debug builds so a faulting kernel is pinned
            // to the chunk that ran it.
            if cfg!(debug_assertions) {
                device.poll(wgpu::Maintain::Wait);
            }
            if let Some(err) = pollster::block_on(device.pop_error_scope()) {
                return Err(RenderError::Device {
                    op: "dispatch",
                    detail: format!("chunk at element {offset}: {err}"),
                });
            }

            // Readback: map exactly this chunk's bytes, add into the
            // field at the chunk offset.
            let slice = staging_buf.slice(0..copy_bytes);
            let (tx, rx) = mpsc::channel();
            slice.map_async(wgpu::MapMode::Read, move |r| {
                let _ = tx.send(r);
            });
            device.poll(wgpu::Maintain::Wait);
            match rx.recv() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(RenderError::Device {
                        op: "readback",
                        detail: format!("chunk at element {offset}: {e}"),
                    })
                }
                Err(_) => {
                    return Err(RenderError::Device {
                        op: "readback",
                        detail: "map callback dropped without result".to_string(),
                    })
                }
            }

            {
                let mapped = slice.get_mapped_range();
                let chunk_samples: &[Complex] = bytemuck::cast_slice(&mapped);
                let dst = &mut field.samples_mut()[offset..offset + len];
                for (d, s) in dst.iter_mut().zip(chunk_samples) {
                    *d += *s;
                }
            }
            staging_buf.unmap();
        }

        Ok(())
    }
}

impl fmt::Display for GpuRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.session {
            Some(s) => write!(f, "GpuRenderer {{ {s} }}"),
            None => write!(f, "GpuRenderer {{ closed, algorithm: {} }}", self.config.algorithm),
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from the renderer façade and the dispatch engine.
#[derive(Debug)]
pub enum RenderError {
    /// Render called on a closed renderer.
    NotOpen,
    /// Opening the underlying session failed.
    Session(SessionError),
    /// SinglePass: the field does not fit one device allocation.
    FieldTooLarge {
        field_bytes: u64,
        max_alloc_bytes: u64,
    },
    /// The field or cloud exceeds the kernel's 32-bit index range.
    IndexRange { samples: usize, points: usize },
    /// The chunk-size policy produced zero samples per chunk.
    ZeroChunk {
        field_elements: usize,
        max_alloc_bytes: u64,
    },
    /// A device operation failed; `op` names it.
    Device { op: &'static str, detail: String },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotOpen => write!(f, "renderer is not open (call open() first)"),
            RenderError::Session(e) => write!(f, "{e}"),
            RenderError::FieldTooLarge {
                field_bytes,
                max_alloc_bytes,
            } => write!(
                f,
                "single-pass field of {field_bytes} bytes exceeds the device's \
                 {max_alloc_bytes}-byte allocation limit; use a multipass algorithm"
            ),
            RenderError::IndexRange { samples, points } => write!(
                f,
                "field of {samples} samples / {points} points exceeds the kernel's \
                 32-bit index range"
            ),
            RenderError::ZeroChunk {
                field_elements,
                max_alloc_bytes,
            } => write!(
                f,
                "chunk size resolved to zero samples (field: {field_elements} samples, \
                 max allocation: {max_alloc_bytes} bytes)"
            ),
            RenderError::Device { op, detail } => write!(f, "device {op} failed: {detail}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Session(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SessionError> for RenderError {
    fn from(e: SessionError) -> Self {
        RenderError::Session(e)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
