use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use image_compressor_rust::{
    handle_upload, DirectorySink, FileSource, InputFile, ResizeFilter, Settings, Status,
};

/// Simple image compressor
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input images (paths, or data: URLs)
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Directory the compressed_<name> files are written to
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Quality for lossy output (0.0-1.0)
    #[arg(long, default_value_t = 0.8)]
    quality: f32,

    /// Max image dimension (longer side)
    #[arg(long, default_value_t = 1920, allow_negative_numbers = true)]
    max_dimension: i64,

    /// Resize filter: nearest, triangle, catmull-rom, gaussian, lanczos3
    #[arg(long, default_value = "lanczos3")]
    filter: ResizeFilter,

    /// Number of worker threads (defaults to one per core)
    #[arg(long)]
    jobs: Option<usize>,
}

fn input_file(arg: String) -> InputFile {
    if arg.starts_with("data:") {
        InputFile::from_data_url("image", arg)
    } else {
        InputFile::from_path(arg)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let settings = Settings::new(args.quality, args.max_dimension)
        .context("Invalid compression settings")?
        .with_filter(args.filter);

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    let sink = DirectorySink::new(&args.out_dir)?;
    let files: Vec<InputFile> = args.inputs.into_iter().map(input_file).collect();
    let original_size: u64 = files
        .iter()
        .filter_map(|f| match f.source() {
            FileSource::Path(p) => std::fs::metadata(p).ok().map(|m| m.len()),
            _ => None,
        })
        .sum();

    println!("{}", Status::Processing);
    let start = Instant::now();
    let report = handle_upload(files, &settings, &sink);

    let mut new_size = 0u64;
    for outcome in &report.outcomes {
        if let Ok(delivery) = &outcome.result {
            new_size += delivery.size as u64;
        }
        let status = outcome.status();
        if status.is_error() {
            eprintln!("{}: {}", outcome.name, status);
        } else {
            println!("{}: {}", outcome.name, status);
        }
        if let Err(e) = &outcome.result {
            log::debug!("{}: {:?}", outcome.name, e);
        }
    }

    println!(
        "Processed {} images in {:.2?}.",
        report.succeeded(),
        start.elapsed()
    );
    println!(
        "Original size: {:.2} MB",
        original_size as f64 / 1_048_576.0
    );
    println!("New size:      {:.2} MB", new_size as f64 / 1_048_576.0);

    if report.failed() > 0 {
        bail!("{} of {} images failed", report.failed(), report.outcomes.len());
    }
    Ok(())
}
