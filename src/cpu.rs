// cpu.rs — Naive CPU reference renderer.
//
// The object wave at hologram sample (row, col) is the superposition of
// unit-amplitude spherical waves from every point source:
//
//     field[row][col] += Σ_p exp(i · k · r_p)
//     r_p = |(sample_x, sample_y, hologram_z) - (p.x, p.y, p.z)|
//     k   = 2π / λ
//
// O(points × rows × cols) with no windowing or occlusion. Slow by
// design — this is the correctness oracle the GPU algorithms are
// validated against, and the `-r simple` path in the CLI.
//
// Distances and phases are computed in f64 and the resulting phasor is
// truncated to f32 on accumulation, keeping the oracle strictly more
// precise than the device path.

use crate::cloud::PointCloud;
use crate::field::{Complex, OpticalField};

/// Reference renderer. Accumulates into the field; callers zero the
/// field themselves when they want a fresh render.
#[derive(Debug, Clone, Copy)]
pub struct CpuRenderer {
    hologram_z: f64,
}

impl CpuRenderer {
    /// `hologram_z` is the z coordinate of the hologram plane in world
    /// space (sources usually sit at negative z).
    pub fn new(hologram_z: f64) -> Self {
        CpuRenderer { hologram_z }
    }

    pub fn hologram_z(&self) -> f64 {
        self.hologram_z
    }

    /// Add the object wave of `cloud` into `field`.
    pub fn render_object_wave(&self, cloud: &PointCloud, field: &mut OpticalField) {
        let k = field.wave_number();
        let pitch = field.pitch();
        let corner_x = field.corner_x();
        let corner_y = field.corner_y();
        let rows = field.rows();
        let cols = field.cols();

        for p in cloud {
            let px = p.x as f64;
            let py = p.y as f64;
            let dz = self.hologram_z - p.z as f64;
            for row in 0..rows {
                let dy = corner_y + row as f64 * pitch - py;
                for col in 0..cols {
                    let dx = corner_x + col as f64 * pitch - px;
                    let r = (dx * dx + dy * dy + dz * dz).sqrt();
                    *field.sample_mut(row, col) += Complex::from_phase(k * r);
                }
            }
        }
    }

    /// Turn the object wave into a recordable hologram by adding the
    /// reference wave. Not implemented yet; the object wave in `field`
    /// is left untouched. Kept so the renderer surface matches the GPU
    /// façade.
    pub fn render_hologram(&self, _field: &mut OpticalField) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::PointSource;

    fn small_field() -> OpticalField {
        OpticalField::new(4, 4, 630e-9, 20e-6)
    }

    #[test]
    fn empty_cloud_leaves_field_untouched() {
        let mut field = small_field();
        CpuRenderer::new(0.01).render_object_wave(&PointCloud::new(), &mut field);
        assert!(field.samples().iter().all(|s| *s == Complex::ZERO));
    }

    #[test]
    fn single_source_phase_is_k_times_distance() {
        // Closed-form check: one source at the origin, every sample must
        // be the unit phasor exp(i·k·r) with r computable by hand.
        let mut field = small_field();
        let mut cloud = PointCloud::new();
        cloud.push(PointSource::new(0.0, 0.0, 0.0));

        let z = 0.01;
        CpuRenderer::new(z).render_object_wave(&cloud, &mut field);

        let k = field.wave_number();
        for row in 0..4 {
            for col in 0..4 {
                let x = field.corner_x() + col as f64 * field.pitch();
                let y = field.corner_y() + row as f64 * field.pitch();
                let r = (x * x + y * y + z * z).sqrt();
                let expected = Complex::from_phase(k * r);
                let got = field.sample(row, col);
                assert!(
                    (got.re - expected.re).abs() < 1e-6 && (got.im - expected.im).abs() < 1e-6,
                    "({row},{col}): got {got}, expected {expected}"
                );
                assert!((got.abs() - 1.0).abs() < 1e-6, "unit amplitude per source");
            }
        }
    }

    #[test]
    fn renders_accumulate() {
        let mut field = small_field();
        let mut cloud = PointCloud::new();
        cloud.push(PointSource::new(0.0, 0.0, 0.0));

        let renderer = CpuRenderer::new(0.01);
        renderer.render_object_wave(&cloud, &mut field);
        let once = field.clone();
        renderer.render_object_wave(&cloud, &mut field);

        for (twice, once) in field.samples().iter().zip(once.samples()) {
            assert!((twice.re - 2.0 * once.re).abs() < 1e-5);
            assert!((twice.im - 2.0 * once.im).abs() < 1e-5);
        }
    }

    #[test]
    fn centered_source_gives_symmetric_field() {
        // A source on the optical axis sees identical distances to the
        // four grid corners.
        let mut field = small_field();
        let mut cloud = PointCloud::new();
        cloud.push(PointSource::new(0.0, 0.0, -0.05));
        CpuRenderer::new(0.0).render_object_wave(&cloud, &mut field);

        let corners = [
            field.sample(0, 0),
            field.sample(0, 3),
            field.sample(3, 0),
            field.sample(3, 3),
        ];
        for c in &corners[1..] {
            assert!((c.re - corners[0].re).abs() < 1e-6);
            assert!((c.im - corners[0].im).abs() < 1e-6);
        }
    }

    #[test]
    fn render_hologram_is_inert() {
        let mut field = small_field();
        let mut cloud = PointCloud::new();
        cloud.push(PointSource::new(0.0, 0.0, 0.0));
        let renderer = CpuRenderer::new(0.01);
        renderer.render_object_wave(&cloud, &mut field);

        let before = field.clone();
        renderer.render_hologram(&mut field);
        assert_eq!(field.samples(), before.samples());
    }
}
