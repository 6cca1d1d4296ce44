use std::io::Cursor;

use approx::assert_relative_eq;
use simtools::_internal_test_data::{
    random_gtc, random_manifest, uniform_egt, CALIBRATION_EGT, SIMPLE_GTC, STANDARD_MANIFEST,
};
use simtools::calibration::{normalize_raw, SampleCalibrator};
use simtools::egt::ClusterFile;
use simtools::gtc::{GtcFile, GtcSections};
use simtools::manifest::reader::ManifestParams;
use simtools::manifest::Manifest;
use simtools::progress::DummyProgressNotifier;
use simtools::qc;
use simtools::sim::reader::SimReader;
use simtools::sim::writer::SimWriter;
use simtools::sim::NumberFormat;

fn matrix_from_samples(manifest: &Manifest, samples: &[GtcFile], format: NumberFormat) -> Vec<u8> {
    let mut writer = SimWriter::new(Vec::new());
    writer
        .write_header(samples.len() as u32, manifest.len() as u32, 2, format)
        .unwrap();
    for sample in samples {
        let values: Vec<f32> = normalize_raw(manifest, sample)
            .unwrap()
            .into_iter()
            .flat_map(|(x, y)| [x as f32, y as f32])
            .collect();
        writer.append_sample(sample.sample_name(), &values).unwrap();
    }
    writer.finish().unwrap()
}

#[test_log::test]
fn test_calibrated_matrix_round_trip() {
    let manifest = Manifest::read(STANDARD_MANIFEST.as_bytes(), &ManifestParams::default()).unwrap();
    let gtc = GtcFile::from_bytes(&SIMPLE_GTC.to_bytes(), GtcSections::ALL).unwrap();

    let data = matrix_from_samples(&manifest, &[gtc.clone()], NumberFormat::Float);
    let mut reader = SimReader::new(Cursor::new(data)).unwrap();
    let sample = reader.read_next_sample().unwrap().unwrap();
    assert!(reader.read_next_sample().unwrap().is_none());

    assert_eq!(sample.name, "sample_1");
    let normalized = normalize_raw(&manifest, &gtc).unwrap();
    for (values, (x, y)) in sample.intensities.to_f64_vec().chunks(2).zip(normalized) {
        assert_relative_eq!(values[0], x, max_relative = 1e-6);
        assert_relative_eq!(values[1], y, max_relative = 1e-6);
    }
}

#[test]
fn test_metrics_of_random_samples() {
    let manifest = random_manifest(500, 4, 7);
    let samples: Vec<_> = (0..3)
        .map(|seed| {
            let fixture = random_gtc(500, 4, seed);
            GtcFile::from_bytes(&fixture.to_bytes(), GtcSections::ALL).unwrap()
        })
        .collect();

    let data = matrix_from_samples(&manifest, &samples, NumberFormat::Float);
    let mut reader = SimReader::new(Cursor::new(data)).unwrap();

    let magnitude = qc::magnitude(&mut reader, &DummyProgressNotifier).unwrap();
    assert_eq!(magnitude.len(), 3);
    let mean: f64 = magnitude.iter().map(|metric| metric.value).sum::<f64>() / 3.0;
    assert_relative_eq!(mean, 1.0, epsilon = 1e-9);

    let xy_difference = qc::xy_difference(&mut reader, &DummyProgressNotifier).unwrap();
    let names: Vec<_> = xy_difference.iter().map(|m| m.sample.as_str()).collect();
    assert_eq!(names, ["sample_1", "sample_1", "sample_1"]);
}

#[test]
fn test_calibrate_random_sample() {
    let manifest = random_manifest(200, 3, 11);
    let gtc = GtcFile::from_bytes(&random_gtc(200, 3, 11).to_bytes(), GtcSections::ALL).unwrap();
    let clusters = ClusterFile::from_bytes(&uniform_egt(&manifest).to_bytes()).unwrap();

    let calibrator = SampleCalibrator::new(&manifest, &gtc)
        .unwrap()
        .with_clusters(&clusters);
    let probes: Vec<_> = calibrator.iter().collect::<Result<_, _>>().unwrap();

    assert_eq!(probes.len(), 200);
    for probe in &probes {
        let baf = probe.b_allele_frequency.unwrap();
        assert!((0.0..=1.0).contains(&baf));
        assert!(probe.log_r_ratio.is_some());
        assert_eq!(
            clusters.find_probe_index(&probe.probe.name),
            probe.probe.array_index()
        );
    }
}

#[test]
fn test_cluster_names_follow_manifest() {
    let clusters = ClusterFile::from_bytes(&CALIBRATION_EGT.to_bytes()).unwrap();
    let manifest = Manifest::read(STANDARD_MANIFEST.as_bytes(), &ManifestParams::default()).unwrap();

    for probe in &manifest {
        assert_eq!(clusters.find_probe_index(&probe.name), probe.array_index());
    }
}
