//! Binding generator for the gdx bridge.
//!
//! Reads the engine's JSON API manifest and emits Rust source for the `gdx`
//! crate:
//!
//! | file                 | contents                                                      |
//! |----------------------|---------------------------------------------------------------|
//! | `classes.rs`         | class handles, deref chains, trampolines, enums, `I<Class>` traits |
//! | `builtin_methods.rs` | inherent methods on builtin value types                       |
//! | `utilities.rs`       | utility function wrappers                                     |
//! | `global_enums.rs`    | top-level enums                                               |
//! | `tables.rs`          | bind-table ids and keys, class descriptors, layout checks     |
//!
//! Used from `build.rs` through [`generate`], or from the command line via the
//! `gdx-codegen` binary.
//!
//! # Example
//!
//! ```ignore
//! let config = gdx_codegen::CodegenConfig::default();
//! gdx_codegen::generate(Path::new("api/extension_api.json"), &out_dir, &config)?;
//! ```

pub mod context;
mod emit;
mod error;
pub mod manifest;

use std::path::{Path, PathBuf};

use proc_macro2::TokenStream;
use tracing::{debug, info};

pub use context::Context;
pub use emit::emit_enum;
pub use error::CodegenError;
pub use manifest::Manifest;

/// Floating point width of the engine build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Single,
    Double,
}

impl std::str::FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Precision::Single),
            "double" => Ok(Precision::Double),
            other => Err(format!("unknown precision `{other}` (expected `single` or `double`)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CodegenConfig {
    pub precision: Precision,
    /// Pointer width of the target, in bits.
    pub pointer_width: u32,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            precision: Precision::Single,
            pointer_width: 64,
        }
    }
}

impl CodegenConfig {
    /// Name of the matching `builtin_class_sizes` entry, e.g. `float_64`.
    pub fn build_configuration(&self) -> String {
        let prefix = match self.precision {
            Precision::Single => "float",
            Precision::Double => "double",
        };
        format!("{}_{}", prefix, self.pointer_width)
    }
}

/// One emitted source file.
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub name: String,
    pub tokens: TokenStream,
}

impl GeneratedFile {
    /// Source text as written to disk.
    pub fn render(&self) -> String {
        format!("// Generated by gdx-codegen. Do not edit.\n{}\n", self.tokens)
    }
}

/// Validate `manifest` and emit every file in memory.
pub fn emit(
    manifest: &Manifest,
    config: &CodegenConfig,
) -> Result<Vec<GeneratedFile>, CodegenError> {
    let ctx = Context::new(manifest)?;
    debug!(
        classes = manifest.classes.len(),
        utilities = manifest.utility_functions.len(),
        builtins = manifest.builtin_classes.len(),
        "manifest validated"
    );
    emit::emit_all(&ctx, config)
}

/// Load the manifest at `manifest_path` and write the generated files into
/// `out_dir`. Files whose contents are unchanged are left untouched.
pub fn generate(
    manifest_path: &Path,
    out_dir: &Path,
    config: &CodegenConfig,
) -> Result<Vec<PathBuf>, CodegenError> {
    let manifest = Manifest::load(manifest_path)?;
    let files = emit(&manifest, config)?;

    std::fs::create_dir_all(out_dir).map_err(|source| CodegenError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(files.len());
    for file in &files {
        let path = out_dir.join(&file.name);
        let text = file.render();
        if std::fs::read_to_string(&path).ok().as_deref() != Some(text.as_str()) {
            std::fs::write(&path, text).map_err(|source| CodegenError::Io {
                path: path.clone(),
                source,
            })?;
            debug!(path = %path.display(), "wrote");
        }
        written.push(path);
    }

    info!(
        manifest = %manifest_path.display(),
        configuration = %config.build_configuration(),
        files = written.len(),
        "bindings generated"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_configuration_names() {
        assert_eq!(CodegenConfig::default().build_configuration(), "float_64");
        let double = CodegenConfig {
            precision: Precision::Double,
            pointer_width: 64,
        };
        assert_eq!(double.build_configuration(), "double_64");
    }

    #[test]
    fn precision_parses_from_cli_text() {
        assert_eq!("double".parse::<Precision>(), Ok(Precision::Double));
        assert!("quad".parse::<Precision>().is_err());
    }
}
