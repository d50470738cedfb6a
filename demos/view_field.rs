// examples/view_field.rs — optical field intensity viewer.
//
// Loads a `.df` file and shows its normalized intensity (|sample|²) as
// a grayscale minifb window. Handy for eyeballing interference fringes
// after render_cloud.
//
// USAGE
//   cargo run --example view_field --release -- out.df
//
// Controls:
//   P      — toggle phase view (hue-less: phase mapped to gray)
//   Q/Esc  — quit

use minifb::{Key, Window, WindowOptions};

use holoren::OpticalField;

fn main() {
    env_logger::init();

    let path = match std::env::args().nth(1) {
        Some(p) => p,
        None => {
            eprintln!("Usage: view_field <field.df>");
            std::process::exit(2);
        }
    };

    let field = match OpticalField::load(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("failed to load {path}: {e}");
            std::process::exit(1);
        }
    };
    let (rows, cols) = (field.rows(), field.cols());
    println!(
        "{path}: {cols}x{rows}, lambda {} m, pitch {} m",
        field.wavelength(),
        field.pitch()
    );

    let intensity_px = intensity_pixels(&field);
    let phase_px = phase_pixels(&field);

    let mut window = Window::new(
        &format!("holoren — {path}"),
        cols,
        rows,
        WindowOptions::default(),
    )
    .unwrap_or_else(|e| {
        eprintln!("failed to open window: {e}");
        std::process::exit(1);
    });
    window.set_target_fps(30);

    let mut show_phase = false;
    let mut p_held = false;
    while window.is_open() && !window.is_key_down(Key::Escape) && !window.is_key_down(Key::Q) {
        // Edge-trigger the toggle so holding P doesn't flicker.
        let p_down = window.is_key_down(Key::P);
        if p_down && !p_held {
            show_phase = !show_phase;
        }
        p_held = p_down;

        let buf = if show_phase { &phase_px } else { &intensity_px };
        window
            .update_with_buffer(buf, cols, rows)
            .unwrap_or_else(|e| {
                eprintln!("window update failed: {e}");
                std::process::exit(1);
            });
    }
}

/// |sample|² normalized to the field's own maximum.
fn intensity_pixels(field: &OpticalField) -> Vec<u32> {
    let intensities: Vec<f32> = field
        .samples()
        .iter()
        .map(|s| s.re * s.re + s.im * s.im)
        .collect();
    let max = intensities.iter().cloned().fold(0.0f32, f32::max).max(f32::MIN_POSITIVE);
    intensities
        .iter()
        .map(|i| gray((i / max * 255.0) as u32))
        .collect()
}

/// Phase in (-π, π] mapped linearly to 0..255.
fn phase_pixels(field: &OpticalField) -> Vec<u32> {
    field
        .samples()
        .iter()
        .map(|s| {
            let t = (s.arg() / std::f32::consts::PI + 1.0) * 0.5;
            gray((t * 255.0) as u32)
        })
        .collect()
}

fn gray(v: u32) -> u32 {
    let v = v.min(255);
    (v << 16) | (v << 8) | v
}
