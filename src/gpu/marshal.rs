// gpu/marshal.rs — host↔device buffer transfers.
//
// Point-cloud uploads come in two layouts, matching the two point
// bindings in wave.wgsl:
//
//   dense   — tight ×3 float stream, byte-for-byte the host slice
//             (`PointSource` is `Pod` with no padding). One transfer.
//   aligned — one vec4<f32> slot per point, x/y/z in lanes 0..3. The
//             fourth lane is never written by the host; wgpu's
//             mandatory zero-initialization is what device code sees
//             there. Written through a mapped-at-creation buffer, so
//             still one transfer and no staging copy.
//
// Output and staging buffers are sized to ONE chunk and reused across
// every dispatch of a render.

use wgpu::util::DeviceExt;

use crate::cloud::{PointCloud, PointSource};
use crate::field::Complex;

pub(crate) const SAMPLE_BYTES: usize = std::mem::size_of::<Complex>();
const ALIGNED_LANES: usize = 4;

/// Upload the dense (tightly packed) point layout.
///
/// The cloud must be non-empty — zero-size buffers cannot be bound.
/// The render engine skips device work for empty clouds.
pub fn upload_cloud_dense(device: &wgpu::Device, cloud: &PointCloud) -> wgpu::Buffer {
    debug_assert!(!cloud.is_empty());
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("points (dense)"),
        contents: bytemuck::cast_slice(cloud.points()),
        usage: wgpu::BufferUsages::STORAGE,
    })
}

/// Upload the vec4-aligned point layout.
///
/// Lanes 0..3 of each slot carry x/y/z; lane 3 is left as the buffer's
/// zero-initialized contents.
pub fn upload_cloud_aligned(device: &wgpu::Device, cloud: &PointCloud) -> wgpu::Buffer {
    debug_assert!(!cloud.is_empty());
    let size = (cloud.len() * ALIGNED_LANES * std::mem::size_of::<f32>()) as u64;
    let buf = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("points (aligned)"),
        size,
        usage: wgpu::BufferUsages::STORAGE,
        mapped_at_creation: true,
    });
    {
        let mut mapped = buf.slice(..).get_mapped_range_mut();
        let lanes: &mut [f32] = bytemuck::cast_slice_mut(&mut mapped);
        for (i, p) in cloud.points().iter().enumerate() {
            lanes[ALIGNED_LANES * i] = p.x;
            lanes[ALIGNED_LANES * i + 1] = p.y;
            lanes[ALIGNED_LANES * i + 2] = p.z;
        }
    }
    buf.unmap();
    buf
}

/// CPU-side mirror of the aligned slot layout (lane 3 zero). The upload
/// path writes through the mapped buffer directly; this exists so the
/// layout is testable without a device.
pub fn pack_aligned(points: &[PointSource]) -> Vec<f32> {
    let mut lanes = vec![0.0f32; points.len() * ALIGNED_LANES];
    for (i, p) in points.iter().enumerate() {
        lanes[ALIGNED_LANES * i] = p.x;
        lanes[ALIGNED_LANES * i + 1] = p.y;
        lanes[ALIGNED_LANES * i + 2] = p.z;
    }
    lanes
}

/// Device-local buffer the kernel writes one chunk of samples into.
pub fn create_chunk_output(device: &wgpu::Device, elements: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("wave chunk output"),
        size: (elements * SAMPLE_BYTES) as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    })
}

/// Mappable buffer the chunk output is copied into for readback.
pub fn create_chunk_staging(device: &wgpu::Device, elements: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("wave chunk staging"),
        size: (elements * SAMPLE_BYTES) as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_aligned_slot_layout() {
        let pts = [
            PointSource::new(1.0, 2.0, 3.0),
            PointSource::new(-4.0, 5.5, -6.25),
        ];
        let lanes = pack_aligned(&pts);
        assert_eq!(lanes.len(), 8, "4 lanes per point");
        assert_eq!(&lanes[0..4], &[1.0, 2.0, 3.0, 0.0]);
        assert_eq!(&lanes[4..8], &[-4.0, 5.5, -6.25, 0.0]);
    }

    #[test]
    fn pack_aligned_empty() {
        assert!(pack_aligned(&[]).is_empty());
    }

    #[test]
    fn pack_aligned_fourth_lane_is_zero() {
        let pts: Vec<PointSource> = (0..17)
            .map(|i| PointSource::new(i as f32, -(i as f32), 0.5 * i as f32))
            .collect();
        let lanes = pack_aligned(&pts);
        for (i, p) in pts.iter().enumerate() {
            assert_eq!(lanes[4 * i], p.x);
            assert_eq!(lanes[4 * i + 1], p.y);
            assert_eq!(lanes[4 * i + 2], p.z);
            assert_eq!(lanes[4 * i + 3], 0.0);
        }
    }
}
