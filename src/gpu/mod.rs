// gpu/mod.rs — GPU rendering layer.
//
// The CPU renderer in the parent crate remains the authoritative
// reference — every GPU algorithm is validated against it sample by
// sample (within f32 tolerance; the native-math variant gets a looser
// bound).
//
// Layering, bottom to top:
//
//   catalog — adapter enumeration, vendor/class classification,
//             preference-mask selection.
//   session — open/close lifecycle: selected adapter, device + queue,
//             compiled kernel, bind group layout, compute pipeline.
//   marshal — host↔device buffer transfers: point-cloud uploads (dense
//             and vec4-aligned), chunk output and staging buffers.
//   render  — chunk planning and the dispatch/readback loop behind the
//             `GpuRenderer` façade.
//
// A field larger than the device's biggest allocation is rendered in
// chunks: one output buffer sized to a single chunk is reused across
// dispatches, and each readback is summed into the field at the chunk's
// element offset.

pub mod catalog;
pub mod marshal;
pub mod render;
pub mod session;

use std::fmt;

/// Which kernel the renderer runs. Fixed at renderer construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderAlgorithm {
    /// One 2D dispatch covering the whole field. Fails up front when
    /// the field exceeds the device's allocation ceiling.
    SinglePass,
    /// Chunked 1D dispatches, dense (3-float) point layout.
    MultiPass,
    /// As `MultiPass` with reduced-precision sin/cos.
    MultiPassNative,
    /// As `MultiPass` with points packed one per vec4.
    MultiPassAligned,
}

impl RenderAlgorithm {
    /// Kernel entry symbol in wave.wgsl.
    pub fn entry_point(self) -> &'static str {
        match self {
            RenderAlgorithm::SinglePass => "obj_wave_single",
            RenderAlgorithm::MultiPass => "obj_wave_multi",
            RenderAlgorithm::MultiPassNative => "obj_wave_multi_native",
            RenderAlgorithm::MultiPassAligned => "obj_wave_multi_aligned",
        }
    }

    /// Whether the kernel reads the vec4-aligned point layout.
    pub fn uses_aligned_points(self) -> bool {
        matches!(self, RenderAlgorithm::MultiPassAligned)
    }

    /// Whether the whole field is covered by one dispatch.
    pub fn is_single_pass(self) -> bool {
        matches!(self, RenderAlgorithm::SinglePass)
    }

    /// CLI / config name. Inverse of [`from_name`](Self::from_name).
    pub fn name(self) -> &'static str {
        match self {
            RenderAlgorithm::SinglePass => "singlepass",
            RenderAlgorithm::MultiPass => "multipass",
            RenderAlgorithm::MultiPassNative => "multipass_native",
            RenderAlgorithm::MultiPassAligned => "multipass_aligned",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "singlepass" => Some(RenderAlgorithm::SinglePass),
            "multipass" => Some(RenderAlgorithm::MultiPass),
            "multipass_native" => Some(RenderAlgorithm::MultiPassNative),
            "multipass_aligned" => Some(RenderAlgorithm::MultiPassAligned),
            _ => None,
        }
    }
}

impl fmt::Display for RenderAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RenderAlgorithm; 4] = [
        RenderAlgorithm::SinglePass,
        RenderAlgorithm::MultiPass,
        RenderAlgorithm::MultiPassNative,
        RenderAlgorithm::MultiPassAligned,
    ];

    #[test]
    fn names_round_trip() {
        for alg in ALL {
            assert_eq!(RenderAlgorithm::from_name(alg.name()), Some(alg));
        }
        assert_eq!(RenderAlgorithm::from_name("SinglePass"), Some(RenderAlgorithm::SinglePass));
        assert_eq!(RenderAlgorithm::from_name("opencl"), None);
    }

    #[test]
    fn entry_points_are_distinct() {
        for a in ALL {
            for b in ALL {
                if a != b {
                    assert_ne!(a.entry_point(), b.entry_point());
                }
            }
        }
    }

    #[test]
    fn only_aligned_uses_vec4_points() {
        assert!(RenderAlgorithm::MultiPassAligned.uses_aligned_points());
        assert!(!RenderAlgorithm::MultiPass.uses_aligned_points());
        assert!(!RenderAlgorithm::MultiPassNative.uses_aligned_points());
        assert!(!RenderAlgorithm::SinglePass.uses_aligned_points());
    }
}
