// tests/test_cpu_render.rs — Integration tests for the CPU reference
// renderer over the public API.
//
// The closed-form scenario: a single point source at the origin and a
// small field at known geometry. Every sample must be exactly the unit
// phasor exp(i·k·r) with r computed by hand, which pins down the wave
// number, the grid centering and the accumulation semantics in one go.

use holoren::{Complex, CpuRenderer, OpticalField, PointCloud, PointSource};

const LAMBDA: f64 = 630e-9;
const PITCH: f64 = 20e-6;
const HOLOGRAM_Z: f64 = 0.01;

#[test]
fn closed_form_single_source() {
    let mut field = OpticalField::new(4, 4, LAMBDA, PITCH);
    let mut cloud = PointCloud::new();
    cloud.push(PointSource::new(0.0, 0.0, 0.0));

    CpuRenderer::new(HOLOGRAM_Z).render_object_wave(&cloud, &mut field);

    let k = 2.0 * std::f64::consts::PI / LAMBDA;
    // 4 samples per axis at 20 µm pitch, centered: positions ±10, ±30 µm.
    for row in 0..4 {
        for col in 0..4 {
            let x = (col as f64 - 1.5) * PITCH;
            let y = (row as f64 - 1.5) * PITCH;
            let r = (x * x + y * y + HOLOGRAM_Z * HOLOGRAM_Z).sqrt();
            let expected = Complex::from_phase(k * r);
            let got = field.sample(row, col);
            assert!(
                (got.re - expected.re).abs() < 1e-6 && (got.im - expected.im).abs() < 1e-6,
                "({row},{col}): got {got}, expected {expected}"
            );
        }
    }
}

#[test]
fn two_sources_superpose() {
    let mut field = OpticalField::new(4, 4, LAMBDA, PITCH);
    let renderer = CpuRenderer::new(HOLOGRAM_Z);

    let mut a = PointCloud::new();
    a.push(PointSource::new(1e-5, 0.0, -1e-4));
    let mut b = PointCloud::new();
    b.push(PointSource::new(-1e-5, 2e-5, -2e-4));
    let mut both = PointCloud::new();
    both.push(a.points()[0]);
    both.push(b.points()[0]);

    // Render a then b into one field, both into another.
    renderer.render_object_wave(&a, &mut field);
    renderer.render_object_wave(&b, &mut field);
    let mut combined = OpticalField::new(4, 4, LAMBDA, PITCH);
    renderer.render_object_wave(&both, &mut combined);

    for (s, c) in field.samples().iter().zip(combined.samples()) {
        assert!((s.re - c.re).abs() < 1e-5 && (s.im - c.im).abs() < 1e-5);
    }
}

#[test]
fn zero_cloud_round_trip_stays_zero() {
    // Render nothing, save, load: still all zeros.
    let mut field = OpticalField::new(8, 8, LAMBDA, PITCH);
    CpuRenderer::new(HOLOGRAM_Z).render_object_wave(&PointCloud::new(), &mut field);
    assert!(field.samples().iter().all(|s| *s == Complex::ZERO));

    let mut buf = Vec::new();
    field.save_to(&mut buf).expect("save");
    let loaded = OpticalField::load_from(&mut buf.as_slice()).expect("load");
    assert!(loaded.samples().iter().all(|s| *s == Complex::ZERO));
}

#[test]
fn explicit_zero_gives_a_fresh_render() {
    let mut field = OpticalField::new(4, 4, LAMBDA, PITCH);
    let mut cloud = PointCloud::new();
    cloud.push(PointSource::new(0.0, 0.0, 0.0));
    let renderer = CpuRenderer::new(HOLOGRAM_Z);

    renderer.render_object_wave(&cloud, &mut field);
    let first = field.clone();

    // Without zeroing the second render accumulates; with zeroing it
    // reproduces the first.
    field.zero();
    renderer.render_object_wave(&cloud, &mut field);
    assert_eq!(field.samples(), first.samples());
}

#[test]
fn intensity_varies_across_the_field() {
    // Two interfering sources must produce non-uniform fringes — a
    // sanity check that the phase actually varies with position.
    let mut field = OpticalField::new(64, 64, LAMBDA, PITCH);
    let mut cloud = PointCloud::new();
    cloud.push(PointSource::new(-2e-4, 0.0, -5e-3));
    cloud.push(PointSource::new(2e-4, 0.0, -5e-3));
    CpuRenderer::new(0.0).render_object_wave(&cloud, &mut field);

    let intensities: Vec<f32> = field.samples().iter().map(|s| s.abs()).collect();
    let min = intensities.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = intensities.iter().cloned().fold(0.0f32, f32::max);
    assert!(max > 1.5, "constructive interference somewhere, got max {max}");
    assert!(min < 0.5, "destructive interference somewhere, got min {min}");
}
