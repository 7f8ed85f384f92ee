use std::path::{Path, PathBuf};

use anyhow::Context as _;
use gdx_codegen::{CodegenConfig, Precision};

const MANIFEST: &str = "api/extension_api.json";

fn main() -> anyhow::Result<()> {
    println!("cargo:rerun-if-changed={MANIFEST}");
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").context("OUT_DIR is not set")?);
    let precision = if std::env::var_os("CARGO_FEATURE_DOUBLE_PRECISION").is_some() {
        Precision::Double
    } else {
        Precision::Single
    };
    let pointer_width = std::env::var("CARGO_CFG_TARGET_POINTER_WIDTH")
        .ok()
        .and_then(|width| width.parse().ok())
        .unwrap_or(64);

    let config = CodegenConfig {
        precision,
        pointer_width,
    };
    gdx_codegen::generate(Path::new(MANIFEST), &out_dir, &config)
        .with_context(|| format!("generating bindings from {MANIFEST}"))?;
    Ok(())
}
