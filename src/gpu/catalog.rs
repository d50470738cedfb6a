// gpu/catalog.rs — adapter enumeration, classification and selection.
//
// Responsibilities:
//   - Enumerate every adapter the instance can see and snapshot the
//     facts selection needs into an `AdapterProfile` (name, vendor,
//     device class, allocation ceiling).
//   - Classify adapters by vendor (PCI id, name fallback) and by device
//     class (GPU / CPU / other).
//   - First-match selection against a caller preference: an adapter is
//     taken iff its vendor bit AND its class bit are both allowed. The
//     search is deterministic — same preference over the same adapter
//     list always lands on the same adapter — and the returned
//     preference is narrowed to exactly the matched vendor and class,
//     so re-running selection with it reproduces the choice.
//
// ADAPTER SELECTION:
// wgpu's default `request_adapter` uses power-preference heuristics
// that may grab llvmpipe/softpipe on WSL2 (where the software renderer
// appears as a valid Vulkan device). We enumerate explicitly, log every
// adapter, and let the preference masks decide.
//
// The search itself is a pure function over `&[AdapterProfile]` so the
// determinism and narrowing properties are unit-testable without a GPU.

use std::fmt;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Hardware vendor of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformVendor {
    Amd,
    Intel,
    Nvidia,
    /// Anything else: Apple, Broadcom, Qualcomm, llvmpipe, dzn, ...
    Other,
}

impl PlatformVendor {
    const ALL: [PlatformVendor; 4] = [
        PlatformVendor::Amd,
        PlatformVendor::Intel,
        PlatformVendor::Nvidia,
        PlatformVendor::Other,
    ];

    fn bit(self) -> u8 {
        match self {
            PlatformVendor::Amd => 1 << 0,
            PlatformVendor::Intel => 1 << 1,
            PlatformVendor::Nvidia => 1 << 2,
            PlatformVendor::Other => 1 << 3,
        }
    }
}

impl fmt::Display for PlatformVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformVendor::Amd => write!(f, "AMD"),
            PlatformVendor::Intel => write!(f, "Intel"),
            PlatformVendor::Nvidia => write!(f, "NVIDIA"),
            PlatformVendor::Other => write!(f, "other"),
        }
    }
}

/// Broad device class of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    /// Discrete, integrated or virtualized GPU hardware.
    Gpu,
    /// Software rasterizer (llvmpipe et al.).
    Cpu,
    /// Unclassifiable (dzn on WSL2 reports Other).
    Other,
}

impl DeviceClass {
    fn bit(self) -> u8 {
        match self {
            DeviceClass::Gpu => 1 << 0,
            DeviceClass::Cpu => 1 << 1,
            DeviceClass::Other => 1 << 2,
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::Gpu => write!(f, "GPU"),
            DeviceClass::Cpu => write!(f, "CPU"),
            DeviceClass::Other => write!(f, "other"),
        }
    }
}

// PCI vendor ids, exact match. Name substrings cover backends that
// report 0 (some drivers under dzn/MoltenVK do).
const PCI_AMD: u32 = 0x1002;
const PCI_INTEL: u32 = 0x8086;
const PCI_NVIDIA: u32 = 0x10DE;

/// Classify an adapter's vendor from its `wgpu::AdapterInfo`.
pub fn classify_vendor(info: &wgpu::AdapterInfo) -> PlatformVendor {
    match info.vendor {
        PCI_AMD => return PlatformVendor::Amd,
        PCI_INTEL => return PlatformVendor::Intel,
        PCI_NVIDIA => return PlatformVendor::Nvidia,
        _ => {}
    }
    let name = info.name.to_ascii_lowercase();
    if name.contains("amd") || name.contains("radeon") {
        PlatformVendor::Amd
    } else if name.contains("intel") {
        PlatformVendor::Intel
    } else if name.contains("nvidia") || name.contains("geforce") {
        PlatformVendor::Nvidia
    } else {
        PlatformVendor::Other
    }
}

/// Classify an adapter's device class.
pub fn classify_class(device_type: wgpu::DeviceType) -> DeviceClass {
    match device_type {
        wgpu::DeviceType::DiscreteGpu
        | wgpu::DeviceType::IntegratedGpu
        | wgpu::DeviceType::VirtualGpu => DeviceClass::Gpu,
        wgpu::DeviceType::Cpu => DeviceClass::Cpu,
        wgpu::DeviceType::Other => DeviceClass::Other,
    }
}

// ---------------------------------------------------------------------------
// Selection preferences
// ---------------------------------------------------------------------------

/// Bitmask preference over adapter vendor and device class.
///
/// An adapter matches iff its vendor bit AND its class bit are both set.
/// The default (`any()`) accepts everything; combinators build narrower
/// masks:
///
/// ```
/// use holoren::gpu::catalog::{SelectionPrefs, PlatformVendor, DeviceClass};
///
/// // Any NVIDIA or AMD GPU, no software rasterizers:
/// let prefs = SelectionPrefs::none()
///     .allow_vendor(PlatformVendor::Nvidia)
///     .allow_vendor(PlatformVendor::Amd)
///     .allow_class(DeviceClass::Gpu);
/// assert!(prefs.allows_class(DeviceClass::Gpu));
/// assert!(!prefs.allows_class(DeviceClass::Cpu));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPrefs {
    vendor_mask: u8,
    class_mask: u8,
}

const VENDOR_ANY: u8 = 0x0F;
const CLASS_ANY: u8 = 0x07;

impl SelectionPrefs {
    /// Accept any vendor, any class.
    pub fn any() -> Self {
        SelectionPrefs {
            vendor_mask: VENDOR_ANY,
            class_mask: CLASS_ANY,
        }
    }

    /// Accept nothing; combine with `allow_*`.
    pub fn none() -> Self {
        SelectionPrefs {
            vendor_mask: 0,
            class_mask: 0,
        }
    }

    /// One vendor, any class.
    pub fn vendor(v: PlatformVendor) -> Self {
        SelectionPrefs {
            vendor_mask: v.bit(),
            class_mask: CLASS_ANY,
        }
    }

    /// Any vendor, one class.
    pub fn device_class(c: DeviceClass) -> Self {
        SelectionPrefs {
            vendor_mask: VENDOR_ANY,
            class_mask: c.bit(),
        }
    }

    /// Exactly one vendor and one class — what selection hands back.
    pub fn narrowed(v: PlatformVendor, c: DeviceClass) -> Self {
        SelectionPrefs {
            vendor_mask: v.bit(),
            class_mask: c.bit(),
        }
    }

    pub fn allow_vendor(mut self, v: PlatformVendor) -> Self {
        self.vendor_mask |= v.bit();
        self
    }

    pub fn allow_class(mut self, c: DeviceClass) -> Self {
        self.class_mask |= c.bit();
        self
    }

    pub fn allows_vendor(&self, v: PlatformVendor) -> bool {
        self.vendor_mask & v.bit() != 0
    }

    pub fn allows_class(&self, c: DeviceClass) -> bool {
        self.class_mask & c.bit() != 0
    }
}

impl Default for SelectionPrefs {
    fn default() -> Self {
        SelectionPrefs::any()
    }
}

impl fmt::Display for SelectionPrefs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut vendors = PlatformVendor::ALL
            .iter()
            .filter(|v| self.allows_vendor(**v))
            .peekable();
        if vendors.peek().is_none() {
            write!(f, "no vendor")?;
        } else {
            for (i, v) in vendors.enumerate() {
                if i > 0 {
                    write!(f, "|")?;
                }
                write!(f, "{v}")?;
            }
        }
        write!(f, " / ")?;
        let classes = [DeviceClass::Gpu, DeviceClass::Cpu, DeviceClass::Other];
        let mut any = false;
        for c in classes {
            if self.allows_class(c) {
                if any {
                    write!(f, "|")?;
                }
                write!(f, "{c}")?;
                any = true;
            }
        }
        if !any {
            write!(f, "no class")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Adapter profiles & selection
// ---------------------------------------------------------------------------

/// Classification snapshot of one enumerated adapter.
#[derive(Debug, Clone)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub vendor: PlatformVendor,
    pub class: DeviceClass,
    /// Largest single buffer the render engine may allocate on this
    /// adapter: min(max_storage_buffer_binding_size, max_buffer_size).
    pub max_alloc_bytes: u64,
}

impl fmt::Display for AdapterProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}, {} {}, max alloc {} MiB)",
            self.name,
            self.backend,
            self.vendor,
            self.class,
            self.max_alloc_bytes >> 20
        )
    }
}

/// Build the profile of one adapter.
pub fn profile_adapter(adapter: &wgpu::Adapter) -> AdapterProfile {
    let info = adapter.get_info();
    let limits = adapter.limits();
    AdapterProfile {
        vendor: classify_vendor(&info),
        class: classify_class(info.device_type),
        name: info.name,
        backend: info.backend,
        max_alloc_bytes: u64::min(
            limits.max_storage_buffer_binding_size as u64,
            limits.max_buffer_size,
        ),
    }
}

/// Enumerate every adapter on the instance, paired with its profile.
/// Logs each adapter at debug level.
pub fn enumerate(instance: &wgpu::Instance) -> Vec<(wgpu::Adapter, AdapterProfile)> {
    instance
        .enumerate_adapters(wgpu::Backends::all())
        .into_iter()
        .map(|adapter| {
            let profile = profile_adapter(&adapter);
            log::debug!("adapter: {profile}");
            (adapter, profile)
        })
        .collect()
}

/// First-match selection over adapter profiles.
///
/// Scans in enumeration order and takes the first adapter whose vendor
/// and class are both allowed by `prefs`. Returns the index and the
/// preference narrowed to exactly the matched vendor/class. `None` when
/// nothing matches.
pub fn select_adapter(
    prefs: SelectionPrefs,
    profiles: &[AdapterProfile],
) -> Option<(usize, SelectionPrefs)> {
    profiles
        .iter()
        .position(|p| prefs.allows_vendor(p.vendor) && prefs.allows_class(p.class))
        .map(|idx| {
            let p = &profiles[idx];
            (idx, SelectionPrefs::narrowed(p.vendor, p.class))
        })
}

/// Selection failure, with "nothing enumerated at all" kept distinct
/// from "nothing matched the preference".
#[derive(Debug)]
pub enum SelectError {
    /// The instance enumerated zero adapters. Check driver / Vulkan ICD
    /// installation.
    NoAdapters,
    /// Adapters exist but none matched the preference masks.
    NoMatch { prefs: SelectionPrefs, seen: usize },
}

impl fmt::Display for SelectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectError::NoAdapters => write!(
                f,
                "no adapters found (is a Vulkan/Metal/DX12 driver installed?)"
            ),
            SelectError::NoMatch { prefs, seen } => write!(
                f,
                "none of {seen} adapter(s) matched preference [{prefs}]"
            ),
        }
    }
}

impl std::error::Error for SelectError {}

/// Enumerate and select in one step.
///
/// Returns the chosen adapter, its profile and the narrowed preference.
pub fn select(
    instance: &wgpu::Instance,
    prefs: SelectionPrefs,
) -> Result<(wgpu::Adapter, AdapterProfile, SelectionPrefs), SelectError> {
    let mut pool = enumerate(instance);
    if pool.is_empty() {
        return Err(SelectError::NoAdapters);
    }

    let profiles: Vec<AdapterProfile> = pool.iter().map(|(_, p)| p.clone()).collect();
    let (idx, resolved) = select_adapter(prefs, &profiles).ok_or(SelectError::NoMatch {
        prefs,
        seen: profiles.len(),
    })?;

    let (adapter, profile) = pool.swap_remove(idx);
    log::info!("selected adapter: {profile} (preference resolved to [{resolved}])");
    Ok((adapter, profile, resolved))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
