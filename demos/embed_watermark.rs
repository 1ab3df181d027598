//! Embed a block-DCT watermark into a single image.
//!
//! Usage:
//! ```sh
//! cargo run --example embed_watermark -- input.png output.png [seed]
//! ```

use std::env;
use std::process;

use dct_watermark::{seeded_rng, OutputPaths, PipelineConfig, StageTimings, WatermarkPipeline};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <input> <output> [seed]", args[0]);
        process::exit(1);
    }

    let input = &args[1];
    let output = &args[2];
    let seed = args.get(3).and_then(|s| s.parse().ok());

    let pipeline =
        WatermarkPipeline::new(PipelineConfig::default()).expect("default config is valid");
    let outputs = OutputPaths::beside(output.as_ref());
    let mut timings = StageTimings::new();

    match pipeline.process_file(input.as_ref(), &outputs, &mut seeded_rng(seed), &mut timings) {
        Ok(result) => {
            println!(
                "Done: {} blocks watermarked, written to {}",
                result.locations.len(),
                outputs.image.display()
            );
            print!("{timings}");
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
