// tests/test_field_io.rs — Integration tests for the `.df` container.
//
// The on-disk layout is consumed by external holography tooling, so
// these tests pin it down byte-for-byte: fixed header offsets, exact
// file size, and lossless sample round trips through a real file.

use std::fs;
use std::path::PathBuf;

use holoren::{Complex, OpticalField};

/// Unique temp path per test; cleaned up by the caller.
fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("holoren_{}_{}.df", name, std::process::id()))
}

#[test]
fn file_round_trip_is_bit_exact() {
    let mut field = OpticalField::new(5, 7, 630e-9, 20e-6);
    for (i, s) in field.samples_mut().iter_mut().enumerate() {
        // Values with no nice decimal form, to catch any text detour.
        *s = Complex::new((i as f32).sin(), (i as f32 * 0.37).cos());
    }

    let path = temp_path("round_trip");
    field.save(&path).expect("save should succeed");
    let loaded = OpticalField::load(&path).expect("load should succeed");
    fs::remove_file(&path).ok();

    assert_eq!(loaded.rows(), 5);
    assert_eq!(loaded.cols(), 7);
    assert_eq!(loaded.wavelength(), 630e-9);
    assert_eq!(loaded.pitch(), 20e-6);
    assert_eq!(loaded.samples(), field.samples());
}

#[test]
fn file_size_is_header_plus_body() {
    let field = OpticalField::new(10, 20, 630e-9, 20e-6);
    let path = temp_path("file_size");
    field.save(&path).expect("save should succeed");
    let meta = fs::metadata(&path).expect("file exists");
    fs::remove_file(&path).ok();

    // 66-byte header + rows*cols complex f32 pairs.
    assert_eq!(meta.len(), 66 + 10 * 20 * 8);
}

#[test]
fn header_bytes_on_disk() {
    let field = OpticalField::new(3, 4, 500e-9, 1e-5);
    let path = temp_path("header");
    field.save(&path).expect("save should succeed");
    let bytes = fs::read(&path).expect("read back");
    fs::remove_file(&path).ok();

    assert_eq!(bytes[0], 4);
    assert_eq!(&bytes[1..5], b"DFHD");
    assert_eq!(f64::from_le_bytes(bytes[5..13].try_into().unwrap()), 500e-9);
    // h_pitch and v_pitch are both the sample pitch.
    assert_eq!(f64::from_le_bytes(bytes[13..21].try_into().unwrap()), 1e-5);
    assert_eq!(f64::from_le_bytes(bytes[21..29].try_into().unwrap()), 1e-5);
    assert_eq!(u64::from_le_bytes(bytes[29..37].try_into().unwrap()), 4, "h_res = cols");
    assert_eq!(u64::from_le_bytes(bytes[37..45].try_into().unwrap()), 3, "v_res = rows");
    // center_x / center_y are written as zero.
    assert_eq!(f64::from_le_bytes(bytes[45..53].try_into().unwrap()), 0.0);
    assert_eq!(f64::from_le_bytes(bytes[53..61].try_into().unwrap()), 0.0);
    assert_eq!(bytes[61], 4);
    assert_eq!(&bytes[62..66], b"DFBF");
}

#[test]
fn load_rejects_non_df_file() {
    let path = temp_path("not_df");
    fs::write(&path, b"this is not an optical field").expect("write");
    let err = OpticalField::load(&path).unwrap_err();
    fs::remove_file(&path).ok();
    // Tag length byte 't' (0x74) is not 4.
    assert!(err.to_string().contains("tag"), "{err}");
}

#[test]
fn load_missing_file_is_io_error() {
    let err = OpticalField::load("/nonexistent/holoren/field.df").unwrap_err();
    assert!(matches!(err, holoren::field::FieldIoError::Io(_)), "{err}");
}
