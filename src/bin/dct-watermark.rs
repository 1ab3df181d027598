use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dct_watermark::{
    default_output_path, is_supported_image, load_luma, seeded_rng, NoopObserver, OutputPaths,
    PipelineConfig, StageObserver, StageTimings, WatermarkPipeline, DEFAULT_BLOCK_SIZE,
    DEFAULT_COMPARISON_STRENGTH, DEFAULT_STRENGTH,
};

#[derive(Parser)]
#[command(
    name = "dct-watermark",
    about = "Embed a pseudo-random watermark into a grayscale image via block DCT",
    version,
    after_help = "Simple usage: dct-watermark <image>  (writes <image>_watermarked.<ext>)\n\n\
                  NOTE: The watermark is not tamper-resistant and is not meant as a\n\
                  security mechanism. Use a lossless output format to preserve it."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Input image file (square; converted to grayscale)
    input: String,

    /// Output image (default: {name}_watermarked.{ext})
    #[arg(short, long)]
    output: Option<String>,

    /// Where to write the watermark matrix image (default: {output}_watermark.png)
    #[arg(long)]
    watermark_out: Option<String>,

    /// Where to write the block DCT magnitude image (default: {output}_dct.png)
    #[arg(long)]
    dct_out: Option<String>,

    /// Also write the batched comparison-path image here
    #[arg(long)]
    comparison_out: Option<String>,

    /// Only write the watermarked image
    #[arg(long)]
    no_artifacts: bool,

    /// Block side in pixels
    #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Embedding strength of the primary path
    #[arg(short, long, default_value_t = DEFAULT_STRENGTH)]
    strength: f32,

    /// Embedding strength of the batched comparison path
    #[arg(long, default_value_t = DEFAULT_COMPARISON_STRENGTH)]
    comparison_strength: f32,

    /// Require the padded image side to equal this value (e.g. 512)
    #[arg(long)]
    target_size: Option<usize>,

    /// Seed for the watermark generator (default: OS entropy)
    #[arg(long)]
    seed: Option<u64>,

    /// Re-read the written image and report the watermark correlation
    #[arg(long)]
    verify: bool,

    /// Print per-stage timings
    #[arg(long)]
    timings: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose && cli.quiet {
        eprintln!("Error: Cannot specify both --verbose and --quiet");
        process::exit(1);
    }
    init_logging(cli.verbose, cli.quiet);

    let input_path = Path::new(&cli.input);
    if !input_path.exists() {
        tracing::error!("Input path does not exist: {}", cli.input);
        process::exit(1);
    }
    if !is_supported_image(input_path) {
        tracing::error!("Unsupported input format: {}", cli.input);
        process::exit(1);
    }

    let config = PipelineConfig {
        block_size: cli.block_size,
        strength: cli.strength,
        comparison_strength: cli.comparison_strength,
        target_size: cli.target_size,
    };

    let pipeline = match WatermarkPipeline::new(config) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            process::exit(1);
        }
    };

    let outputs = output_paths(&cli, input_path);

    let mut rng = seeded_rng(cli.seed);
    let mut timings = StageTimings::new();
    let mut noop = NoopObserver;
    let observer: &mut dyn StageObserver = if cli.timings {
        &mut timings
    } else {
        &mut noop
    };

    let output = match pipeline.process_file(input_path, &outputs, &mut rng, observer) {
        Ok(o) => o,
        Err(e) => {
            tracing::error!("[FAIL] {}: {e}", cli.input);
            process::exit(1);
        }
    };

    if !cli.quiet {
        eprintln!(
            "[OK] {} -> {} ({} blocks of {}x{})",
            cli.input,
            outputs.image.display(),
            output.locations.len(),
            cli.block_size,
            cli.block_size,
        );
        if cli.verbose && output.fallback_blocks > 0 {
            eprintln!(
                "  -> {} flat blocks used the fallback coefficient",
                output.fallback_blocks
            );
        }
        if cli.timings {
            eprint!("{timings}");
        }
    }

    if cli.verify {
        let verified = load_luma(input_path)
            .and_then(|original| {
                let written = load_luma(&outputs.image)?;
                pipeline.verify(&original, &written, &output.watermark)
            });
        match verified {
            Ok(v) if v.detected => {
                if !cli.quiet {
                    eprintln!("[VERIFY] watermark detected (correlation {:.3})", v.correlation);
                }
            }
            Ok(v) => {
                tracing::error!(
                    "[VERIFY] watermark not detected (correlation {:.3})",
                    v.correlation
                );
                process::exit(1);
            }
            Err(e) => {
                tracing::error!("[VERIFY] {e}");
                process::exit(1);
            }
        }
    }
}

fn output_paths(cli: &Cli, input: &Path) -> OutputPaths {
    let image = cli
        .output
        .as_ref()
        .map_or_else(|| default_output_path(input), PathBuf::from);

    let mut outputs = if cli.no_artifacts {
        OutputPaths::image_only(image)
    } else {
        OutputPaths::beside(&image)
    };
    if let Some(p) = &cli.watermark_out {
        outputs.watermark = Some(PathBuf::from(p));
    }
    if let Some(p) = &cli.dct_out {
        outputs.spectrum = Some(PathBuf::from(p));
    }
    outputs.comparison = cli.comparison_out.as_ref().map(PathBuf::from);
    outputs
}
