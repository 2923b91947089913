//! Delta command

use std::path::Path;

use anyhow::{Context, Result};

use sparkcast_core::delta;

/// Generate a binary delta patching `prev_bundle` up to `mac_bundle`.
pub fn delta(
    mac_bundle: &Path,
    prev_bundle: &Path,
    delta_path: &Path,
    generator: Option<&Path>,
) -> Result<()> {
    let generator = generator.map_or_else(delta::default_generator, Path::to_path_buf);
    delta::generate(&generator, prev_bundle, mac_bundle, delta_path)
        .with_context(|| format!("Failed to generate {}", delta_path.display()))?;

    println!();
    println!("delta generated: {}", delta_path.display());
    Ok(())
}
