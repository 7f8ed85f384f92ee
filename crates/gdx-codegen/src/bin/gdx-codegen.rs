use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use gdx_codegen::{CodegenConfig, Precision};
use tracing_subscriber::EnvFilter;

/// Generate gdx bindings from an engine API manifest.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to `extension_api.json`
    manifest: PathBuf,

    /// Directory receiving the generated files
    #[arg(short, long)]
    out: PathBuf,

    /// Floating point precision of the engine build
    #[arg(long, default_value = "single")]
    precision: Precision,

    /// Pointer width of the target in bits
    #[arg(long, default_value_t = 64)]
    pointer_width: u32,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = CodegenConfig {
        precision: args.precision,
        pointer_width: args.pointer_width,
    };
    let written = gdx_codegen::generate(&args.manifest, &args.out, &config)
        .with_context(|| format!("generating bindings from {}", args.manifest.display()))?;

    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}
