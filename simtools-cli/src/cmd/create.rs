use std::io::Write;

use anyhow::{bail, Context};
use log::{debug, info};
use simtools::calibration::{check_probe_count, normalize_raw};
use simtools::gtc::{GtcFile, GtcSections};
use simtools::manifest::Manifest;
use simtools::progress::ProgressNotifier;
use simtools::sim::writer::SimWriter;
use simtools::sim::NumberFormat;

use crate::sample_list::SampleList;

const NUM_CHANNELS: u8 = 2;

/// Raw intensities of every manifest probe, in manifest order.
fn raw_values(manifest: &Manifest, gtc: &GtcFile, values: &mut Vec<f32>) -> anyhow::Result<()> {
    check_probe_count(manifest, gtc)?;
    for probe in manifest {
        let raw = probe
            .array_index()
            .and_then(|i| Some((*gtc.x_raw().get(i)?, *gtc.y_raw().get(i)?)));
        match raw {
            Some((x, y)) => {
                values.push(f32::from(x));
                values.push(f32::from(y));
            }
            _ => bail!("Probe {} has out of range index {}", probe.name, probe.index),
        }
    }
    Ok(())
}

/// Sample and probe counts as stored in the SIM header.
fn matrix_dimensions(num_samples: usize, num_probes: usize) -> anyhow::Result<(u32, u32)> {
    let num_samples = u32::try_from(num_samples)
        .with_context(|| format!("Too many samples for a SIM file: {}", num_samples))?;
    let num_probes = u32::try_from(num_probes)
        .with_context(|| format!("Too many probes for a SIM file: {}", num_probes))?;
    Ok((num_samples, num_probes))
}

/// Writes a two-channel SIM matrix with one record per listed sample and the
/// probes in locus order.
pub(crate) fn create<W: Write>(
    samples: &SampleList,
    manifest: &mut Manifest,
    writer: W,
    normalize: bool,
    progress_notifier: &dyn ProgressNotifier,
) -> anyhow::Result<()> {
    samples.validate()?;
    manifest.order_by_locus();

    let number_format = if normalize {
        NumberFormat::Float
    } else {
        NumberFormat::Integer
    };
    let (num_samples, num_probes) = matrix_dimensions(samples.len(), manifest.len())?;
    let mut sim_writer = SimWriter::new(writer);
    sim_writer.write_header(num_samples, num_probes, NUM_CHANNELS, number_format)?;
    info!(
        "Writing {} samples x {} probes ({} values)",
        samples.len(),
        manifest.len(),
        number_format
    );

    progress_notifier.set_iter_num(samples.len() as u64);
    let sections = GtcSections::XFORM | GtcSections::INTENSITY;
    let mut values = Vec::with_capacity(manifest.len() * usize::from(NUM_CHANNELS));
    for (i, entry) in samples.iter().enumerate() {
        let gtc = GtcFile::open(&entry.path, sections)
            .with_context(|| format!("Could not read {}", entry.path.display()))?;
        let name = entry.sample_name(&gtc);
        debug!(
            "GTC file {} of {}: {} (sample {})",
            i + 1,
            samples.len(),
            entry.path.display(),
            name
        );

        values.clear();
        if normalize {
            let normalized = normalize_raw(manifest, &gtc)
                .with_context(|| format!("Could not normalize {}", entry.path.display()))?;
            values.extend(
                normalized
                    .into_iter()
                    .flat_map(|(x, y)| [x as f32, y as f32]),
            );
        } else {
            raw_values(manifest, &gtc, &mut values)
                .with_context(|| format!("Could not read intensities of {}", entry.path.display()))?;
        }

        sim_writer
            .append_sample(name, &values)
            .with_context(|| format!("Could not write sample {}", name))?;
        progress_notifier.inc_iter();
    }

    sim_writer.finish()?.flush()?;
    Ok(())
}
