use criterion::{criterion_group, criterion_main, Criterion};
use simtools::_internal_test_data::{random_gtc, random_manifest, uniform_egt};
use simtools::calibration::{normalize_raw, SampleCalibrator};
use simtools::egt::ClusterFile;
use simtools::gtc::{GtcFile, GtcSections};
use simtools::manifest::reader::ManifestParams;
use simtools::manifest::Manifest;

const PROBES: u32 = 100_000;

fn parse_manifest(c: &mut Criterion) {
    let mut data = Vec::new();
    random_manifest(PROBES, 8, 1).write_to(&mut data).unwrap();

    c.bench_function("Parse 100k probe manifest", |b| {
        b.iter(|| {
            let manifest = Manifest::read(data.as_slice(), &ManifestParams::default()).unwrap();
            assert_eq!(manifest.len(), PROBES as usize);
        })
    });
}

fn decode_gtc(c: &mut Criterion) {
    let data = random_gtc(PROBES, 8, 1).to_bytes();

    c.bench_function("Decode 100k probe GTC", |b| {
        b.iter(|| {
            let gtc = GtcFile::from_bytes(&data, GtcSections::ALL).unwrap();
            assert_eq!(gtc.x_raw().len(), PROBES as usize);
        })
    });
}

fn normalize_100k(c: &mut Criterion) {
    let manifest = random_manifest(PROBES, 8, 1);
    let gtc = GtcFile::from_bytes(&random_gtc(PROBES, 8, 1).to_bytes(), GtcSections::ALL).unwrap();

    c.bench_function("Normalize 100k probes", |b| {
        b.iter(|| {
            let normalized = normalize_raw(&manifest, &gtc).unwrap();
            assert_eq!(normalized.len(), PROBES as usize);
        })
    });
}

fn calibrate_100k(c: &mut Criterion) {
    let manifest = random_manifest(PROBES, 8, 1);
    let gtc = GtcFile::from_bytes(&random_gtc(PROBES, 8, 1).to_bytes(), GtcSections::ALL).unwrap();
    let clusters = ClusterFile::from_bytes(&uniform_egt(&manifest).to_bytes()).unwrap();

    c.bench_function("Calibrate 100k probes", |b| {
        b.iter(|| {
            let calibrator = SampleCalibrator::new(&manifest, &gtc)
                .unwrap()
                .with_clusters(&clusters);
            assert_eq!(calibrator.iter().filter(Result::is_ok).count(), PROBES as usize);
        })
    });
}

criterion_group!(
    benches,
    parse_manifest,
    decode_gtc,
    normalize_100k,
    calibrate_100k
);
criterion_main!(benches);
