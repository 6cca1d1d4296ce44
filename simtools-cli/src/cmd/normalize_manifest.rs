use std::io::Write;

use anyhow::Context;
use log::info;
use simtools::manifest::Manifest;

/// Writes the manifest in the canonical 9-column layout, alleles on the TOP
/// strand.
pub(crate) fn normalize_manifest<W: Write>(manifest: &Manifest, mut writer: W) -> anyhow::Result<()> {
    manifest
        .write_to(&mut writer)
        .context("Could not write the normalized manifest")?;
    writer.flush()?;

    info!("Wrote {} normalized probes", manifest.len());
    Ok(())
}
