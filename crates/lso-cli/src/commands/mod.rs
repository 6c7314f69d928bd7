//! Subcommand implementations

pub mod inspect;
pub mod run;

use anyhow::Context;
use lso_bytecode::{verify_image, ScriptImage};
use std::path::Path;

/// Read, decode and verify an image file
pub fn load_image(path: &Path) -> anyhow::Result<ScriptImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let image = ScriptImage::decode(&bytes)
        .with_context(|| format!("{} is not a valid LSO image", path.display()))?;
    verify_image(&image).with_context(|| format!("{} failed verification", path.display()))?;
    tracing::info!(
        path = %path.display(),
        bytes = bytes.len(),
        states = image.states.len(),
        "image loaded"
    );
    Ok(image)
}
