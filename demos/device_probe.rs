// examples/device_probe.rs — adapter enumeration dump.
//
// Prints every adapter wgpu can see, its vendor/class classification
// and allocation ceiling, then shows what default selection would pick.
//
// USAGE
//   cargo run --example device_probe
//   cargo run --example device_probe -- gpu      # GPU-class only
//   cargo run --example device_probe -- nvidia   # one vendor

use holoren::gpu::catalog::{self, DeviceClass, PlatformVendor, SelectionPrefs};

fn main() {
    env_logger::init();

    let prefs = match std::env::args().nth(1).as_deref() {
        None => SelectionPrefs::any(),
        Some("gpu") => SelectionPrefs::device_class(DeviceClass::Gpu),
        Some("cpu") => SelectionPrefs::device_class(DeviceClass::Cpu),
        Some("amd") => SelectionPrefs::vendor(PlatformVendor::Amd),
        Some("intel") => SelectionPrefs::vendor(PlatformVendor::Intel),
        Some("nvidia") => SelectionPrefs::vendor(PlatformVendor::Nvidia),
        Some(other) => {
            eprintln!("unknown filter {other:?} (gpu|cpu|amd|intel|nvidia)");
            std::process::exit(2);
        }
    };

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        flags: wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER,
        ..Default::default()
    });

    let pool = catalog::enumerate(&instance);
    if pool.is_empty() {
        println!("no adapters found");
        std::process::exit(1);
    }

    println!("{} adapter(s):", pool.len());
    for (i, (_, profile)) in pool.iter().enumerate() {
        println!("  [{i}] {profile}");
    }

    match catalog::select(&instance, prefs) {
        Ok((_, profile, resolved)) => {
            println!("\nselection with [{prefs}]:");
            println!("  chose    {profile}");
            println!("  narrowed [{resolved}]");
        }
        Err(e) => {
            println!("\nselection with [{prefs}] failed: {e}");
            std::process::exit(1);
        }
    }
}
