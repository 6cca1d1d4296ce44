use std::io::Write;

use anyhow::{bail, Context};
use chrono::Local;
use csv::QuoteStyle;
use log::{debug, info};
use simtools::calibration::{CalibratedProbe, SampleCalibrator};
use simtools::egt::ClusterFile;
use simtools::gtc::{GtcFile, GtcSections};
use simtools::manifest::Manifest;
use simtools::progress::ProgressNotifier;

use crate::opts::TextWriter;
use crate::sample_list::SampleList;

const FCR_COLUMNS: [&str; 13] = [
    "SNP Name",
    "Sample ID",
    "Allele1 - Top",
    "Allele2 - Top",
    "GC Score",
    "Theta",
    "R",
    "X",
    "Y",
    "X Raw",
    "Y Raw",
    "B Allele Freq",
    "Log R Ratio",
];

/// Final call report writer: a `[Header]` section followed by a
/// tab-delimited `[Data]` table with one row per (sample, probe).
pub(crate) struct FcrWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> FcrWriter<W> {
    pub fn new(
        mut writer: W,
        content: &str,
        num_samples: usize,
        num_probes: usize,
    ) -> anyhow::Result<Self> {
        writeln!(writer, "[Header]")?;
        writeln!(writer, "GSGT Version\tsimtools")?;
        writeln!(
            writer,
            "Processing Date\t{}",
            Local::now().format("%m/%d/%Y %I:%M %p")
        )?;
        writeln!(writer, "Content\t{}", content)?;
        writeln!(writer, "Num SNPs\t{}", num_probes)?;
        writeln!(writer, "Total SNPs\t{}", num_probes)?;
        writeln!(writer, "Num Samples\t{}", num_samples)?;
        writeln!(writer, "Total Samples\t{}", num_samples)?;
        writeln!(writer, "File\t1 of 1")?;
        writeln!(writer, "[Data]")?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(QuoteStyle::Never)
            .from_writer(writer);
        writer.write_record(FCR_COLUMNS)?;

        Ok(Self { writer })
    }

    pub fn write_probe(&mut self, sample_name: &str, probe: &CalibratedProbe) -> anyhow::Result<()> {
        let (allele1, allele2) = probe
            .alleles
            .map_or(('-', '-'), |alleles| (alleles.a(), alleles.b()));
        let metric = |value: Option<f64>| value.map_or_else(|| "NaN".to_owned(), |v| format!("{:.4}", v));

        self.writer.write_record([
            probe.probe.name.clone(),
            sample_name.to_owned(),
            allele1.to_string(),
            allele2.to_string(),
            format!("{:.4}", probe.score.unwrap_or(0.0)),
            format!("{:.3}", probe.theta),
            format!("{:.3}", probe.r),
            format!("{:.3}", probe.x),
            format!("{:.3}", probe.y),
            probe.x_raw.to_string(),
            probe.y_raw.to_string(),
            metric(probe.b_allele_frequency),
            metric(probe.log_r_ratio),
        ])?;
        Ok(())
    }

    pub fn write_sample(
        &mut self,
        sample_name: &str,
        calibrator: &SampleCalibrator,
    ) -> anyhow::Result<()> {
        for probe in calibrator.iter() {
            self.write_probe(sample_name, &probe?)?;
        }
        Ok(())
    }

    pub fn finish(self) -> anyhow::Result<W> {
        let writer = self
            .writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Could not flush the report: {}", e.error()))?;
        Ok(writer)
    }
}

pub(crate) fn fcr(
    samples: &SampleList,
    manifest: &Manifest,
    clusters: &ClusterFile,
    writer: TextWriter,
    progress_notifier: &dyn ProgressNotifier,
) -> anyhow::Result<()> {
    if clusters.len() != manifest.len() {
        bail!(
            "Cluster file has {} probes, but the manifest has {}",
            clusters.len(),
            manifest.len()
        );
    }
    samples.validate()?;

    let content = manifest
        .path()
        .and_then(|path| path.file_name())
        .map_or_else(String::new, |name| name.to_string_lossy().into_owned());
    let mut fcr_writer = FcrWriter::new(writer, &content, samples.len(), manifest.len())?;

    progress_notifier.set_iter_num(samples.len() as u64);
    let sections = GtcSections::XFORM
        | GtcSections::INTENSITY
        | GtcSections::GENOTYPES
        | GtcSections::SCORES;
    for entry in samples.iter() {
        let gtc = GtcFile::open(&entry.path, sections)
            .with_context(|| format!("Could not read {}", entry.path.display()))?;
        let name = entry.sample_name(&gtc);
        debug!("Reporting sample {} from {}", name, entry.path.display());

        let calibrator = SampleCalibrator::new(manifest, &gtc)?.with_clusters(clusters);
        fcr_writer
            .write_sample(name, &calibrator)
            .with_context(|| format!("Could not calibrate {}", entry.path.display()))?;
        progress_notifier.inc_iter();
    }

    fcr_writer
        .finish()?
        .finish()
        .context("Could not finish writing the report")?;
    info!(
        "Wrote the final call report for {} samples",
        samples.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use simtools::_internal_test_data::{CALIBRATION_EGT, SIMPLE_GTC, STANDARD_MANIFEST};
    use simtools::calibration::SampleCalibrator;
    use simtools::egt::ClusterFile;
    use simtools::gtc::{GtcFile, GtcSections};
    use simtools::manifest::reader::ManifestParams;
    use simtools::manifest::Manifest;

    use crate::cmd::fcr::FcrWriter;

    #[test]
    fn test_report_layout() {
        let manifest =
            Manifest::read(STANDARD_MANIFEST.as_bytes(), &ManifestParams::default()).unwrap();
        let gtc = GtcFile::from_bytes(&SIMPLE_GTC.to_bytes(), GtcSections::ALL).unwrap();
        let clusters = ClusterFile::from_bytes(&CALIBRATION_EGT.to_bytes()).unwrap();
        let calibrator = SampleCalibrator::new(&manifest, &gtc)
            .unwrap()
            .with_clusters(&clusters);

        let mut writer = FcrWriter::new(Vec::new(), "test.bpm.csv", 1, manifest.len()).unwrap();
        writer.write_sample("sample_1", &calibrator).unwrap();
        let report = String::from_utf8(writer.finish().unwrap()).unwrap();
        let lines: Vec<_> = report.lines().collect();

        assert_eq!(lines[0], "[Header]");
        assert_eq!(lines[3], "Content\ttest.bpm.csv");
        assert_eq!(lines[4], "Num SNPs\t6");
        assert_eq!(lines[9], "[Data]");
        assert!(lines[10].starts_with("SNP Name\tSample ID\tAllele1 - Top"));
        assert_eq!(lines.len(), 11 + 6);
        assert_eq!(
            lines[11],
            "rs1001\tsample_1\tA\tC\t0.9000\t0.500\t2000.000\t1000.000\t1000.000\t1000\t1000\t0.5000\t0.0000"
        );
        assert!(lines[12].starts_with("rs1002\tsample_1\tG\tG\t0.8000\t"));
    }
}
