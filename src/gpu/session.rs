// gpu/session.rs — accelerator session lifecycle.
//
// A `Session` owns everything the render engine needs, in creation
// order: instance → adapter (via the catalog) → device + queue →
// kernel source → shader module → bind group layout → compute
// pipeline. `open()` builds the whole chain or fails with an error
// naming the step; a partial chain is torn down by RAII on the early
// return. `close()` releases resources in reverse creation order and
// is idempotent.
//
// BUILD DIAGNOSTICS:
// wgpu reports shader and pipeline validation failures through error
// scopes, not return values. Each create call that can fail is wrapped
// in push_error_scope(Validation) / pop_error_scope; the captured
// error's text is the naga/driver diagnostic (the moral equivalent of
// an OpenCL build log) and is carried in the session error verbatim.
// A kernel file that compiles but lacks the configured entry point
// surfaces in the pipeline scope with the entry name attached.
//
// KERNEL SOURCE:
// The built-in wave.wgsl is embedded with `include_str!`. A caller may
// substitute a kernel file at open time; it must define the same entry
// symbols and bindings for the algorithms it intends to run.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::gpu::catalog::{self, AdapterProfile, SelectError, SelectionPrefs};
use crate::gpu::RenderAlgorithm;

/// Built-in kernel source, embedded at compile time.
pub const DEFAULT_KERNEL: &str = include_str!("../shaders/wave.wgsl");

// Binding indices, shared with wave.wgsl and the render engine.
pub(crate) const BIND_POINTS_DENSE: u32 = 0;
pub(crate) const BIND_POINTS_ALIGNED: u32 = 1;
pub(crate) const BIND_WAVE_OUT: u32 = 2;
pub(crate) const BIND_PARAMS: u32 = 3;
pub(crate) const BIND_CHUNK: u32 = 4;

/// An open accelerator session: device, queue, compiled kernel and the
/// compute pipeline for one algorithm.
///
/// Resources are `Option` so `close()` can release them in reverse
/// creation order; a closed session is inert and closing again is a
/// no-op.
///
/// # Field drop order
/// Rust drops struct fields in declaration order. `_instance` is
/// declared last so the `wgpu::Instance` outlives the device-level
/// objects — dzn (the D3D12-to-Vulkan layer on WSL2) crashes when the
/// instance goes first.
#[derive(Debug)]
pub struct Session {
    pipeline: Option<wgpu::ComputePipeline>,
    bind_layout: Option<wgpu::BindGroupLayout>,
    shader: Option<wgpu::ShaderModule>,
    queue: Option<wgpu::Queue>,
    device: Option<wgpu::Device>,
    algorithm: RenderAlgorithm,
    adapter: AdapterProfile,
    resolved: SelectionPrefs,
    max_alloc_bytes: u64,
    /// Keeps the instance alive until everything above is dropped.
    _instance: wgpu::Instance,
}

/// Borrowed view of an open session's live resources.
pub struct SessionParts<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub pipeline: &'a wgpu::ComputePipeline,
    pub bind_layout: &'a wgpu::BindGroupLayout,
}

impl Session {
    /// Open a session: select an adapter matching `prefs`, create the
    /// device, compile the kernel (from `kernel_path` or the built-in
    /// source) and build the pipeline for `algorithm`.
    pub fn open(
        prefs: SelectionPrefs,
        algorithm: RenderAlgorithm,
        kernel_path: Option<&Path>,
    ) -> Result<Session, SessionError> {
        pollster::block_on(Self::open_async(prefs, algorithm, kernel_path))
    }

    async fn open_async(
        prefs: SelectionPrefs,
        algorithm: RenderAlgorithm,
        kernel_path: Option<&Path>,
    ) -> Result<Session, SessionError> {
        // Validation layer in debug builds for shader error feedback;
        // non-conformant adapters (dzn on WSL2) enumerated either way.
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::VALIDATION
                | wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        } else {
            wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        };
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags,
            ..Default::default()
        });

        let (adapter, profile, resolved) = catalog::select(&instance, prefs)?;

        // The biggest buffer the chunk planner may allocate. Cached from
        // the adapter before device creation; the device is requested
        // with the adapter's full limits so the value is actually usable.
        let max_alloc_bytes = profile.max_alloc_bytes;
        let limits = adapter.limits();

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("holoren"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(SessionError::DeviceRequest)?;

        // Kernel source: caller-supplied file or the embedded default.
        let source: Cow<'static, str> = match kernel_path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|e| {
                    if e.kind() == io::ErrorKind::NotFound {
                        SessionError::KernelNotFound(path.to_path_buf())
                    } else {
                        SessionError::KernelRead {
                            path: path.to_path_buf(),
                            source: e,
                        }
                    }
                })?;
                if text.trim().is_empty() {
                    return Err(SessionError::KernelEmpty(path.to_path_buf()));
                }
                log::info!("using kernel source {}", path.display());
                Cow::Owned(text)
            }
            None => Cow::Borrowed(DEFAULT_KERNEL),
        };

        // Compile inside a validation scope: the captured error text is
        // the compiler diagnostic.
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("wave.wgsl"),
            source: wgpu::ShaderSource::Wgsl(source),
        });
        if let Some(err) = device.pop_error_scope().await {
            return Err(SessionError::Build {
                device: profile.name.clone(),
                log: err.to_string(),
            });
        }

        // Bind group layout + pipeline for the configured algorithm. A
        // kernel missing the entry symbol fails here, with the symbol
        // named in the error.
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("wave BGL"),
            entries: &bind_layout_entries(algorithm),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("wave pipeline layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(algorithm.entry_point()),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: algorithm.entry_point(),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        if let Some(err) = device.pop_error_scope().await {
            return Err(SessionError::Pipeline {
                device: profile.name.clone(),
                entry: algorithm.entry_point(),
                log: err.to_string(),
            });
        }

        log::info!(
            "session open: {} / {} on {}",
            algorithm,
            algorithm.entry_point(),
            profile.name
        );

        Ok(Session {
            pipeline: Some(pipeline),
            bind_layout: Some(bind_layout),
            shader: Some(shader),
            queue: Some(queue),
            device: Some(device),
            algorithm,
            adapter: profile,
            resolved,
            max_alloc_bytes,
            _instance: instance,
        })
    }

    pub fn is_open(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn algorithm(&self) -> RenderAlgorithm {
        self.algorithm
    }

    /// Profile of the adapter the session runs on.
    pub fn adapter(&self) -> &AdapterProfile {
        &self.adapter
    }

    /// The selection preference narrowed to the adapter actually chosen.
    pub fn resolved_prefs(&self) -> SelectionPrefs {
        self.resolved
    }

    /// Largest single buffer the render engine may allocate.
    pub fn max_alloc_bytes(&self) -> u64 {
        self.max_alloc_bytes
    }

    /// Live resources, or `None` once closed.
    pub fn parts(&self) -> Option<SessionParts<'_>> {
        Some(SessionParts {
            device: self.device.as_ref()?,
            queue: self.queue.as_ref()?,
            pipeline: self.pipeline.as_ref()?,
            bind_layout: self.bind_layout.as_ref()?,
        })
    }

    /// Release all device resources, newest first. Idempotent.
    pub fn close(&mut self) {
        if self.pipeline.is_some() {
            log::debug!("session close: {}", self.adapter.name);
        }
        self.pipeline.take();
        self.bind_layout.take();
        self.shader.take();
        self.queue.take();
        self.device.take();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Session {{ {}, algorithm: {}, adapter: {} }}",
            if self.is_open() { "open" } else { "closed" },
            self.algorithm,
            self.adapter
        )
    }
}

// ---------------------------------------------------------------------------
// Bind group layout
// ---------------------------------------------------------------------------

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Layout entries for the bindings the algorithm's entry point actually
/// uses (wgpu validates the layout against the shader interface).
fn bind_layout_entries(algorithm: RenderAlgorithm) -> Vec<wgpu::BindGroupLayoutEntry> {
    let points = if algorithm.uses_aligned_points() {
        storage_entry(BIND_POINTS_ALIGNED, true)
    } else {
        storage_entry(BIND_POINTS_DENSE, true)
    };
    let mut entries = vec![
        points,
        storage_entry(BIND_WAVE_OUT, false),
        uniform_entry(BIND_PARAMS),
    ];
    if !algorithm.is_single_pass() {
        entries.push(uniform_entry(BIND_CHUNK));
    }
    entries
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from opening a session.
#[derive(Debug)]
pub enum SessionError {
    /// Adapter selection failed.
    Select(SelectError),
    /// wgpu device request failed (driver issue, unsupported limits).
    DeviceRequest(wgpu::RequestDeviceError),
    /// Kernel source file does not exist.
    KernelNotFound(PathBuf),
    /// Kernel source file exists but is empty (or whitespace only).
    KernelEmpty(PathBuf),
    /// Kernel source file could not be read.
    KernelRead { path: PathBuf, source: io::Error },
    /// Kernel failed to compile; `log` is the compiler diagnostic.
    Build { device: String, log: String },
    /// Pipeline creation failed — typically the configured entry point
    /// is missing from a substituted kernel.
    Pipeline {
        device: String,
        entry: &'static str,
        log: String,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Select(e) => write!(f, "adapter selection failed: {e}"),
            SessionError::DeviceRequest(e) => write!(f, "device request failed: {e}"),
            SessionError::KernelNotFound(p) => {
                write!(f, "kernel source not found: {}", p.display())
            }
            SessionError::KernelEmpty(p) => {
                write!(f, "kernel source is empty: {}", p.display())
            }
            SessionError::KernelRead { path, source } => {
                write!(f, "failed to read kernel source {}: {source}", path.display())
            }
            SessionError::Build { device, log } => {
                write!(f, "kernel build failed on {device}:\n{log}")
            }
            SessionError::Pipeline { device, entry, log } => {
                write!(
                    f,
                    "pipeline creation for entry point {entry:?} failed on {device}:\n{log}"
                )
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Select(e) => Some(e),
            SessionError::DeviceRequest(e) => Some(e),
            SessionError::KernelRead { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<SelectError> for SessionError {
    fn from(e: SelectError) -> Self {
        SessionError::Select(e)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
