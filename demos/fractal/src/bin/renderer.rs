//! Renders one Mandelbrot tile to a PNG file. Ported from the original
//! source's `cmd/renderer`; this is the user workload the Manager/Worker
//! control plane dispatches, not part of the cluster's correctness surface.

use clap::Parser;
use image::{ImageBuffer, Rgba};

#[derive(Parser, Debug)]
#[command(name = "renderer")]
struct Args {
    #[arg(long, allow_hyphen_values = true)]
    minx: f64,
    #[arg(long, allow_hyphen_values = true)]
    miny: f64,
    #[arg(long, allow_hyphen_values = true)]
    maxx: f64,
    #[arg(long, allow_hyphen_values = true)]
    maxy: f64,
    #[arg(long, default_value_t = 1024)]
    w: u32,
    #[arg(long, default_value_t = 1024)]
    h: u32,
    #[arg(long, default_value_t = 200)]
    iter: u32,
    #[arg(long, default_value = "fractal.png")]
    out: String,
}

fn main() {
    let args = Args::parse();

    println!(
        "Rendering fractal to {} ({}x{})...",
        args.out, args.w, args.h
    );
    let start = std::time::Instant::now();

    let image = render(
        args.minx, args.miny, args.maxx, args.maxy, args.w, args.h, args.iter,
    );

    if let Some(parent) = std::path::Path::new(&args.out).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("error creating output directory: {e}");
                std::process::exit(1);
            }
        }
    }

    if let Err(e) = image.save(&args.out) {
        eprintln!("error encoding PNG: {e}");
        std::process::exit(1);
    }

    println!("Done in {:?}", start.elapsed());
}

fn render(
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    width: u32,
    height: u32,
    max_iter: u32,
) -> ImageBuffer<Rgba<u8>, Vec<u8>> {
    let dx = (max_x - min_x) / width as f64;
    let dy = (max_y - min_y) / height as f64;

    ImageBuffer::from_fn(width, height, |x, y| {
        let cx = min_x + x as f64 * dx;
        let cy = min_y + y as f64 * dy;
        let mut zx = 0.0_f64;
        let mut zy = 0.0_f64;
        let mut iter = 0;

        while zx * zx + zy * zy < 4.0 && iter < max_iter {
            let next_zx = zx * zx - zy * zy + cx;
            let next_zy = 2.0 * zx * zy + cy;
            zx = next_zx;
            zy = next_zy;
            iter += 1;
        }

        if iter < max_iter {
            Rgba([
                (iter * 5) as u8,
                (iter * 13) as u8,
                (iter * 23) as u8,
                255,
            ])
        } else {
            Rgba([0, 0, 0, 255])
        }
    })
}
