use std::io::Write;
use std::path::Path;

use anyhow::Context;
use csv::QuoteStyle;
use log::info;
use simtools::qc::{magnitude, xy_difference, SampleMetric};
use simtools::sim::reader::SimReader;

use crate::opts::{OutputMode, OutputWriter};
use crate::PROGRESS_BAR;

/// Writes `sample<TAB>value` lines with six decimal places.
fn write_metrics<W: Write>(writer: W, metrics: &[SampleMetric]) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .from_writer(writer);
    for metric in metrics {
        let value = format!("{:.6}", metric.value);
        writer.write_record([metric.sample.as_str(), value.as_str()])?;
    }
    writer.flush()?;

    Ok(())
}

fn write_metrics_to(path: &Path, metrics: &[SampleMetric]) -> anyhow::Result<()> {
    let output = OutputWriter::from_path(path, OutputMode::Text)?;
    write_metrics(output.into_write(), metrics)
        .with_context(|| format!("Could not write {}", path.display()))
}

pub(crate) fn qc(
    input: &Path,
    magnitude_output: Option<&Path>,
    xydiff_output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut reader = SimReader::open(input)
        .with_context(|| format!("Could not open the SIM file {}", input.display()))?;

    if let Some(path) = magnitude_output {
        PROGRESS_BAR.set_stage("Magnitude");
        let metrics = magnitude(&mut reader, &*PROGRESS_BAR)
            .context("Could not compute the sample magnitude")?;
        write_metrics_to(path, &metrics)?;
        info!("Wrote magnitude of {} samples", metrics.len());
    }

    if let Some(path) = xydiff_output {
        PROGRESS_BAR.set_stage("XY difference");
        let metrics = xy_difference(&mut reader, &*PROGRESS_BAR)
            .context("Could not compute the XY intensity difference")?;
        write_metrics_to(path, &metrics)?;
        info!("Wrote XY difference of {} samples", metrics.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use simtools::qc::SampleMetric;

    use crate::cmd::qc::write_metrics;

    #[test]
    fn test_metric_lines() {
        let metrics = [
            SampleMetric {
                sample: "s1".to_owned(),
                value: 1.0 / 3.0,
            },
            SampleMetric {
                sample: "sample two".to_owned(),
                value: -2.5,
            },
        ];
        let mut data = Vec::new();
        write_metrics(&mut data, &metrics).unwrap();

        assert_eq!(
            String::from_utf8(data).unwrap(),
            "s1\t0.333333\nsample two\t-2.500000\n"
        );
    }
}
