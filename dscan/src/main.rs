use std::path::PathBuf;
use std::process;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use dscan::config::ScanConfig;
use dscan::pipeline::{Pipeline, PixelAssignment};
use dscan::sim::pulse::{kind_of, pixel_of, simulate_stream, PulseTemplate, StreamTemplate};

#[derive(Parser)]
#[command(about = "Simulates an acquisition run and reports implant-decay correlation statistics")]
struct Args {
    /// JSON configuration file; built-in defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of implant/decay pairs to simulate
    #[arg(long, default_value_t = 50)]
    pairs: usize,

    /// Seed for the simulated stream
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match ScanConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                process::exit(1);
            }
        },
        None => ScanConfig::default(),
    };

    let extent = config.grid_extent;
    let stream = StreamTemplate {
        extent,
        pairs: args.pairs,
        ..StreamTemplate::default()
    };

    let mut rng = StdRng::seed_from_u64(args.seed);
    let hits = simulate_stream(&stream, &PulseTemplate::default(), &mut rng);

    let mut pipeline = Pipeline::new(config);
    let (results, summary, err) = pipeline.run(hits, |event| {
        let first = &event.hits()[0];
        Some(PixelAssignment {
            pixel: pixel_of(first, extent),
            kind: kind_of(first)?,
            vetoed: false,
        })
    });

    for result in results.iter().take(10) {
        println!("{}", result);
    }
    println!("{}", summary);

    if let Some(e) = err {
        eprintln!("run aborted: {}", e);
        process::exit(1);
    }
}
