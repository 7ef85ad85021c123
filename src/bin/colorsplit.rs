use clap::Parser;
use colorsplit::params::{MAX_COLORS, MIN_COLORS};
use colorsplit::{Params, process_file};
use std::path::Path;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Split a textured GLB into one part per palette color, and save it as a multi-object 3MF.
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Path to input mesh (.glb or .gltf).
    pub input: String,

    /// Number of colors.
    #[arg(
        short = 'k',
        long = "colors",
        default_value_t = 8,
        value_parser = clap::value_parser!(u8).range(MIN_COLORS as i64..=MAX_COLORS as i64),
    )]
    pub colors: u8,

    /// Path to 3MF output.
    #[arg(short, long, default_value = "out.3mf")]
    pub output: String,

    /// Path to colored GLB preview.
    #[arg(long)]
    pub preview: Option<String>,

    /// Path to palette legend (.txt, .json or .png swatch).
    #[arg(long)]
    pub palette: Option<String>,

    /// Seed for clustering, random if omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Samples per mini-batch.
    #[arg(long, default_value_t = 4096)]
    pub batch_size: usize,
}

fn run(args: &Args) -> colorsplit::Result<()> {
    let params = Params {
        num_colors: args.colors as usize,
        batch_size: args.batch_size,
        seed: args.seed,
        preview: args.preview.is_some(),
        ..Default::default()
    };
    let out = process_file(&args.input, &params)?;
    out.write_all(
        Path::new(&args.output),
        args.preview.as_deref().map(Path::new),
        args.palette.as_deref().map(Path::new),
    )?;
    print!("{}", out.palette.to_text());
    Ok(())
}

pub fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!(input = %args.input, "{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
