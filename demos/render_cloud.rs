// examples/render_cloud.rs — end-to-end hologram renderer CLI.
//
// Loads a `.pc` point cloud, renders its object wave (CPU reference or
// GPU) and writes the optical field as a `.df` file.
//
// USAGE
//   cargo run --example render_cloud --release -- -i scene.pc -o out.df
//   cargo run --example render_cloud --release -- \
//       -i scene.pc -o out.df -w 512 -h 512 -s 20e-6 -l 630e-9 \
//       -z 0.3 -r gpu -a multipass_aligned -c 65536
//
// FLAGS
//   -i <file>   input point cloud (.pc), required
//   -o <file>   output optical field (.df), required
//   -w <n>      hologram width in samples  (default 200)
//   -h <n>      hologram height in samples (default 200)
//   -s <m>      sample pitch               (default 20e-6)
//   -l <m>      wavelength                 (default 630e-9)
//   -z <m>      hologram plane z           (default 0)
//   -r <name>   renderer: simple | gpu     (default gpu)
//   -a <name>   gpu algorithm: singlepass | multipass |
//               multipass_native | multipass_aligned (default multipass)
//   -c <n>      chunk size in samples, 0 = derive from device (default 0)
//   -f <file>   substitute WGSL kernel source
//
// RUST_LOG=debug shows adapter enumeration and chunk planning.

use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;

use holoren::{
    CpuRenderer, GpuRenderer, OpticalField, PointCloud, RenderAlgorithm, RendererConfig,
};

struct Options {
    input: PathBuf,
    output: PathBuf,
    cols: usize,
    rows: usize,
    pitch: f64,
    wavelength: f64,
    hologram_z: f64,
    use_gpu: bool,
    algorithm: RenderAlgorithm,
    chunk: usize,
    kernel: Option<PathBuf>,
}

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {program} -i input.pc -o output.df [-w cols] [-h rows] [-s pitch] \
         [-l lambda] [-z hologram_z] [-r simple|gpu] [-a algorithm] [-c chunk] [-f kernel.wgsl]"
    );
    exit(2);
}

fn parse_options() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let program = args[0].clone();

    let mut input = None;
    let mut output = None;
    let mut opts = Options {
        input: PathBuf::new(),
        output: PathBuf::new(),
        cols: 200,
        rows: 200,
        pitch: 20e-6,
        wavelength: 630e-9,
        hologram_z: 0.0,
        use_gpu: true,
        algorithm: RenderAlgorithm::MultiPass,
        chunk: 0,
        kernel: None,
    };

    let mut it = args.iter().skip(1);
    while let Some(flag) = it.next() {
        let mut value = |name: &str| -> String {
            match it.next() {
                Some(v) => v.clone(),
                None => {
                    eprintln!("{program}: flag {name} needs a value");
                    usage(&program);
                }
            }
        };
        match flag.as_str() {
            "-i" => input = Some(PathBuf::from(value("-i"))),
            "-o" => output = Some(PathBuf::from(value("-o"))),
            "-w" => opts.cols = parse(&program, "-w", &value("-w")),
            "-h" => opts.rows = parse(&program, "-h", &value("-h")),
            "-s" => opts.pitch = parse(&program, "-s", &value("-s")),
            "-l" => opts.wavelength = parse(&program, "-l", &value("-l")),
            "-z" => opts.hologram_z = parse(&program, "-z", &value("-z")),
            "-c" => opts.chunk = parse(&program, "-c", &value("-c")),
            "-f" => opts.kernel = Some(PathBuf::from(value("-f"))),
            "-r" => match value("-r").as_str() {
                "simple" => opts.use_gpu = false,
                "gpu" => opts.use_gpu = true,
                other => {
                    eprintln!("{program}: unknown renderer {other:?} (simple|gpu)");
                    usage(&program);
                }
            },
            "-a" => {
                let name = value("-a");
                match RenderAlgorithm::from_name(&name) {
                    Some(alg) => opts.algorithm = alg,
                    None => {
                        eprintln!("{program}: unknown algorithm {name:?}");
                        usage(&program);
                    }
                }
            }
            other => {
                eprintln!("{program}: unknown flag {other:?}");
                usage(&program);
            }
        }
    }

    match (input, output) {
        (Some(i), Some(o)) => {
            opts.input = i;
            opts.output = o;
            opts
        }
        _ => {
            eprintln!("{program}: -i and -o are required");
            usage(&program);
        }
    }
}

fn parse<T: std::str::FromStr>(program: &str, flag: &str, text: &str) -> T {
    text.parse().unwrap_or_else(|_| {
        eprintln!("{program}: bad value {text:?} for {flag}");
        usage(program);
    })
}

fn main() {
    env_logger::init();
    let opts = parse_options();

    let cloud = match PointCloud::load_pc(&opts.input) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load {}: {e}", opts.input.display());
            exit(1);
        }
    };
    println!(
        "{}: {} point(s); rendering {}x{} field (pitch {} m, lambda {} m, z {} m)",
        opts.input.display(),
        cloud.len(),
        opts.rows,
        opts.cols,
        opts.pitch,
        opts.wavelength,
        opts.hologram_z
    );

    let mut field = OpticalField::new(opts.rows, opts.cols, opts.wavelength, opts.pitch);
    let t0 = Instant::now();

    if opts.use_gpu {
        let mut renderer = GpuRenderer::new(RendererConfig {
            algorithm: opts.algorithm,
            hologram_z: opts.hologram_z,
            chunk_elements: if opts.chunk == 0 { None } else { Some(opts.chunk) },
            kernel_path: opts.kernel.clone(),
            ..RendererConfig::default()
        });
        if let Err(e) = renderer.open() {
            eprintln!("failed to open GPU renderer: {e}");
            exit(1);
        }
        println!("{renderer}");
        if let Err(e) = renderer.render_object_wave(&cloud, &mut field) {
            eprintln!("render failed: {e}");
            eprintln!("last error: {}", renderer.last_error());
            exit(1);
        }
        renderer.close();
    } else {
        CpuRenderer::new(opts.hologram_z).render_object_wave(&cloud, &mut field);
    }

    println!("rendered in {:.3} s", t0.elapsed().as_secs_f64());

    if let Err(e) = field.save(&opts.output) {
        eprintln!("failed to save {}: {e}", opts.output.display());
        exit(1);
    }
    println!("wrote {}", opts.output.display());
}
