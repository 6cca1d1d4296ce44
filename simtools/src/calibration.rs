//! Intensity normalization and the derived per-probe metrics: Illumina
//! (theta, R) coordinates, B allele frequency and log R ratio.

use std::error::Error;
use std::f64::consts::FRAC_PI_2;
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;

use log::debug;

use crate::egt::ClusterFile;
use crate::gtc::{GtcFile, GENOTYPE_AA, GENOTYPE_AB, GENOTYPE_BB};
use crate::manifest::strand::AllelePair;
use crate::manifest::{Manifest, Probe};

#[derive(Debug)]
pub enum CalibrationError {
    /// The manifest and a sample file disagree on the number of probes.
    SizeMismatch {
        path: Option<PathBuf>,
        manifest: usize,
        container: usize,
    },
    /// Two adjacent cluster mean angles coincide.
    UndefinedSlope { lower: f64, upper: f64 },
    /// The probe's normalization group has no transform in the sample file.
    MissingTransform { norm_id: i32 },
    /// The probe index points outside the per-probe arrays.
    ProbeOutOfRange { name: String, index: u32 },
}

impl Display for CalibrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationError::SizeMismatch {
                path,
                manifest,
                container,
            } => {
                write!(
                    f,
                    "Manifest has {} probes, but the sample file has {}",
                    manifest, container
                )?;
                if let Some(path) = path {
                    write!(f, " ({})", path.display())?;
                }
                Ok(())
            }
            CalibrationError::UndefinedSlope { lower, upper } => write!(
                f,
                "Undefined slope between cluster angles {} and {}",
                lower, upper
            ),
            CalibrationError::MissingTransform { norm_id } => write!(
                f,
                "No normalization transform for normalization id {}",
                norm_id
            ),
            CalibrationError::ProbeOutOfRange { name, index } => {
                write!(f, "Probe {} has out of range index {}", name, index)
            }
        }
    }
}

impl Error for CalibrationError {}

pub type CalibrationResult<T> = Result<T, CalibrationError>;

/// Converts normalized intensities to `(theta, r)`, where theta is the
/// angle scaled so that a right angle maps to 1, and `r = x + y`.
///
/// # Examples
/// ```
/// use simtools::calibration::illumina_coordinates;
///
/// assert_eq!(illumina_coordinates(1.0, 1.0), (0.5, 2.0));
/// assert_eq!(illumina_coordinates(2.0, 0.0), (0.0, 2.0));
/// ```
#[must_use]
pub fn illumina_coordinates(x: f64, y: f64) -> (f64, f64) {
    let theta = y.atan2(x) / FRAC_PI_2;
    (theta, x + y)
}

/// Piecewise linear B allele frequency of `theta` relative to the AA, AB
/// and BB cluster mean angles.
#[must_use]
pub fn b_allele_frequency(theta: f64, mean_angle: &[f32; 3]) -> f64 {
    let [aa, ab, bb] = mean_angle.map(f64::from);

    if theta <= aa {
        0.0
    } else if theta >= bb {
        1.0
    } else if theta < ab {
        0.5 * (theta - aa) / (ab - aa)
    } else {
        0.5 + 0.5 * (theta - ab) / (bb - ab)
    }
}

/// Log2 of the observed R over the R expected at `theta`, linearly
/// interpolated between the two cluster means enclosing `theta`.
pub fn log_r_ratio(
    theta: f64,
    r: f64,
    mean_radius: &[f32; 3],
    mean_angle: &[f32; 3],
) -> CalibrationResult<f64> {
    let radius = mean_radius.map(f64::from);
    let angle = mean_angle.map(f64::from);

    let upper = if theta < angle[1] { 1 } else { 2 };
    let lower = upper - 1;
    let width = angle[upper] - angle[lower];
    if width == 0.0 {
        return Err(CalibrationError::UndefinedSlope {
            lower: angle[lower],
            upper: angle[upper],
        });
    }

    let slope = (radius[upper] - radius[lower]) / width;
    let expected_r = radius[lower] + slope * (theta - angle[lower]);
    Ok((r / expected_r).log2())
}

/// Fails with [`CalibrationError::SizeMismatch`] unless the sample file has
/// raw intensities for every manifest probe.
pub fn check_probe_count(manifest: &Manifest, sample: &GtcFile) -> CalibrationResult<()> {
    let container = sample.x_raw().len().min(sample.y_raw().len());
    if manifest.len() != container || sample.x_raw().len() != sample.y_raw().len() {
        return Err(CalibrationError::SizeMismatch {
            path: sample.path().map(ToOwned::to_owned),
            manifest: manifest.len(),
            container: sample.x_raw().len().max(sample.y_raw().len()),
        });
    }
    Ok(())
}

/// Calibrated values of a single probe in a single sample.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedProbe<'a> {
    pub probe: &'a Probe,
    pub x_raw: u16,
    pub y_raw: u16,
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub r: f64,
    /// Genotype call in TOP strand alleles, `--` for no-calls.
    pub alleles: Option<AllelePair>,
    pub score: Option<f32>,
    pub b_allele_frequency: Option<f64>,
    pub log_r_ratio: Option<f64>,
}

/// Binds a manifest to one sample file (and optionally a cluster file) and
/// calibrates its probes.
#[derive(Debug, Clone, Copy)]
pub struct SampleCalibrator<'a> {
    manifest: &'a Manifest,
    sample: &'a GtcFile,
    clusters: Option<&'a ClusterFile>,
}

impl<'a> SampleCalibrator<'a> {
    /// Checks the probe count before any probe is processed.
    pub fn new(manifest: &'a Manifest, sample: &'a GtcFile) -> CalibrationResult<Self> {
        check_probe_count(manifest, sample)?;
        debug!(
            "Calibrating sample {} against {} probes",
            sample.sample_name(),
            manifest.len()
        );
        Ok(Self {
            manifest,
            sample,
            clusters: None,
        })
    }

    #[must_use]
    pub fn with_clusters(mut self, clusters: &'a ClusterFile) -> Self {
        self.clusters = Some(clusters);
        self
    }

    fn raw_intensities(&self, probe: &Probe) -> CalibrationResult<(u16, u16)> {
        probe
            .array_index()
            .and_then(|i| Some((*self.sample.x_raw().get(i)?, *self.sample.y_raw().get(i)?)))
            .ok_or_else(|| CalibrationError::ProbeOutOfRange {
                name: probe.name.clone(),
                index: probe.index,
            })
    }

    /// Raw intensities of the probe, normalized with the transform of its
    /// normalization group.
    pub fn normalized_intensities(&self, probe: &Probe) -> CalibrationResult<(f64, f64)> {
        let (x_raw, y_raw) = self.raw_intensities(probe)?;
        let xform = self
            .manifest
            .normalization_index(probe.norm_id)
            .and_then(|i| self.sample.xforms().get(i))
            .ok_or(CalibrationError::MissingTransform {
                norm_id: probe.norm_id,
            })?;
        Ok(xform.normalize(x_raw, y_raw))
    }

    /// Genotype call expressed in the probe's TOP strand alleles.
    fn call_alleles(&self, probe: &Probe) -> Option<AllelePair> {
        let genotype = *self.sample.genotypes().get(probe.array_index()?)?;
        let [a, b] = probe.alleles.0;
        let call = match genotype {
            GENOTYPE_AA => AllelePair([a, a]),
            GENOTYPE_AB => AllelePair([a, b]),
            GENOTYPE_BB => AllelePair([b, b]),
            _ => AllelePair::NO_CALL,
        };
        Some(call)
    }

    pub fn calibrate(&self, probe: &'a Probe) -> CalibrationResult<CalibratedProbe<'a>> {
        let (x_raw, y_raw) = self.raw_intensities(probe)?;
        let (x, y) = self.normalized_intensities(probe)?;
        let (theta, r) = illumina_coordinates(x, y);

        let (b_allele_frequency, log_r_ratio) = match self
            .clusters
            .and_then(|clusters| {
                let i = probe.array_index()?;
                Some((clusters.get_mean_radius(i)?, clusters.get_mean_angle(i)?))
            }) {
            Some((mean_radius, mean_angle)) => (
                Some(b_allele_frequency(theta, &mean_angle)),
                Some(log_r_ratio(theta, r, &mean_radius, &mean_angle)?),
            ),
            None => (None, None),
        };

        Ok(CalibratedProbe {
            probe,
            x_raw,
            y_raw,
            x,
            y,
            theta,
            r,
            alleles: self.call_alleles(probe),
            score: probe
                .array_index()
                .and_then(|i| self.sample.scores().get(i))
                .copied(),
            b_allele_frequency,
            log_r_ratio,
        })
    }

    /// Calibrates every manifest probe, in manifest order.
    pub fn iter(&self) -> impl Iterator<Item = CalibrationResult<CalibratedProbe<'a>>> + '_ {
        self.manifest.iter().map(move |probe| self.calibrate(probe))
    }
}

/// Normalized `(x, y)` intensities of every manifest probe, in manifest
/// order.
pub fn normalize_raw(manifest: &Manifest, sample: &GtcFile) -> CalibrationResult<Vec<(f64, f64)>> {
    let calibrator = SampleCalibrator::new(manifest, sample)?;
    manifest
        .iter()
        .map(|probe| calibrator.normalized_intensities(probe))
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    use crate::_internal_test_data::{
        numbered_manifest, GtcFixture, CALIBRATION_EGT, SIMPLE_GTC, STANDARD_MANIFEST,
    };
    use crate::calibration::{
        b_allele_frequency, check_probe_count, illumina_coordinates, log_r_ratio, normalize_raw,
        CalibrationError, SampleCalibrator,
    };
    use crate::egt::ClusterFile;
    use crate::gtc::{GtcFile, GtcSections};
    use crate::manifest::reader::ManifestParams;
    use crate::manifest::strand::AllelePair;
    use crate::manifest::Manifest;

    const MEAN_ANGLE: [f32; 3] = [0.1, 0.5, 0.9];
    const MEAN_RADIUS: [f32; 3] = [1.0, 2.0, 1.5];

    fn standard_manifest() -> Manifest {
        Manifest::read(STANDARD_MANIFEST.as_bytes(), &ManifestParams::default()).unwrap()
    }

    #[test]
    fn test_illumina_coordinates() {
        let (theta, r) = illumina_coordinates(0.0, 3.0);
        assert_relative_eq!(theta, 1.0);
        assert_eq!(r, 3.0);

        let (theta, r) = illumina_coordinates(3.0, 1.0);
        assert_relative_eq!(theta, 1.0f64.atan2(3.0) / std::f64::consts::FRAC_PI_2);
        assert_eq!(r, 4.0);
    }

    #[test]
    fn test_baf_at_cluster_means() {
        for (theta, expected) in MEAN_ANGLE.iter().zip([0.0, 0.5, 1.0]) {
            assert_eq!(b_allele_frequency(f64::from(*theta), &MEAN_ANGLE), expected);
        }
        assert_eq!(b_allele_frequency(-0.3, &MEAN_ANGLE), 0.0);
        assert_eq!(b_allele_frequency(1.2, &MEAN_ANGLE), 1.0);
        assert_relative_eq!(
            b_allele_frequency(0.3, &MEAN_ANGLE),
            0.25,
            epsilon = 1e-6
        );
        assert_relative_eq!(
            b_allele_frequency(0.7, &MEAN_ANGLE),
            0.75,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_baf_monotone() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let mut thetas: Vec<f64> = (0..1000).map(|_| rng.gen_range(-0.2..1.2)).collect();
        thetas.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let bafs: Vec<f64> = thetas
            .iter()
            .map(|&theta| b_allele_frequency(theta, &MEAN_ANGLE))
            .collect();
        assert!(bafs.windows(2).all(|w| w[0] <= w[1]));
        assert!(bafs.iter().all(|&baf| (0.0..=1.0).contains(&baf)));
    }

    #[test]
    fn test_lrr_at_heterozygous_mean() {
        let lrr = log_r_ratio(
            f64::from(MEAN_ANGLE[1]),
            f64::from(MEAN_RADIUS[1]),
            &MEAN_RADIUS,
            &MEAN_ANGLE,
        )
        .unwrap();
        assert_eq!(lrr, 0.0);
    }

    #[test]
    fn test_lrr_interpolation() {
        let lrr = log_r_ratio(0.3, 3.0, &MEAN_RADIUS, &MEAN_ANGLE).unwrap();
        assert_relative_eq!(lrr, 1.0, epsilon = 1e-6);

        // Beyond the BB cluster the last interval is extrapolated.
        let lrr = log_r_ratio(1.3, 1.0, &MEAN_RADIUS, &MEAN_ANGLE).unwrap();
        assert_relative_eq!(lrr, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_lrr_undefined_slope() {
        let angles = [0.2, 0.2, 0.8];
        assert!(matches!(
            log_r_ratio(0.1, 1.0, &MEAN_RADIUS, &angles),
            Err(CalibrationError::UndefinedSlope { .. })
        ));
        assert!(log_r_ratio(0.5, 1.0, &MEAN_RADIUS, &angles).is_ok());
    }

    #[test]
    fn test_size_mismatch() {
        let manifest = numbered_manifest(100);
        let fixture = GtcFixture {
            x_raw: vec![100; 99],
            y_raw: vec![200; 99],
            ..SIMPLE_GTC.clone()
        };
        let gtc = GtcFile::from_bytes(&fixture.to_bytes(), GtcSections::ALL).unwrap();

        assert!(matches!(
            check_probe_count(&manifest, &gtc),
            Err(CalibrationError::SizeMismatch {
                manifest: 100,
                container: 99,
                ..
            })
        ));
        assert!(SampleCalibrator::new(&manifest, &gtc).is_err());
        assert!(normalize_raw(&manifest, &gtc).is_err());
    }

    #[test]
    fn test_intensities_not_requested() {
        let manifest = standard_manifest();
        let gtc = GtcFile::from_bytes(&SIMPLE_GTC.to_bytes(), GtcSections::SCORES).unwrap();

        assert!(matches!(
            check_probe_count(&manifest, &gtc),
            Err(CalibrationError::SizeMismatch { container: 0, .. })
        ));
    }

    #[test_log::test]
    fn test_calibrate_sample() {
        let manifest = standard_manifest();
        let gtc = GtcFile::from_bytes(&SIMPLE_GTC.to_bytes(), GtcSections::ALL).unwrap();
        let clusters = ClusterFile::from_bytes(&CALIBRATION_EGT.to_bytes()).unwrap();
        let calibrator = SampleCalibrator::new(&manifest, &gtc)
            .unwrap()
            .with_clusters(&clusters);

        let probes: Vec<_> = calibrator.iter().collect::<Result<_, _>>().unwrap();
        assert_eq!(probes.len(), 6);

        let first = &probes[0];
        assert_eq!(first.probe.name, "rs1001");
        assert_eq!((first.x_raw, first.y_raw), (1000, 1000));
        assert_eq!((first.x, first.y), (1000.0, 1000.0));
        assert_relative_eq!(first.theta, 0.5);
        assert_eq!(first.r, 2000.0);
        assert_eq!(first.alleles, Some(AllelePair(*b"AC")));
        assert_relative_eq!(first.score.unwrap(), 0.9);
        assert_relative_eq!(first.b_allele_frequency.unwrap(), 0.5, epsilon = 1e-6);
        assert_relative_eq!(first.log_r_ratio.unwrap(), 0.0, epsilon = 1e-6);

        let second = &probes[1];
        assert_eq!((second.x, second.y), (995.0, 40.0));
        assert_eq!(second.alleles, Some(AllelePair(*b"GG")));
    }

    #[test]
    fn test_calibrate_without_clusters() {
        let manifest = standard_manifest();
        let gtc = GtcFile::from_bytes(&SIMPLE_GTC.to_bytes(), GtcSections::ALL).unwrap();
        let calibrator = SampleCalibrator::new(&manifest, &gtc).unwrap();

        let probe = calibrator.calibrate(&manifest.probes()[0]).unwrap();
        assert_eq!(probe.b_allele_frequency, None);
        assert_eq!(probe.log_r_ratio, None);
    }

    #[test]
    fn test_normalize_raw() {
        let manifest = standard_manifest();
        let gtc = GtcFile::from_bytes(&SIMPLE_GTC.to_bytes(), GtcSections::ALL).unwrap();

        let normalized = normalize_raw(&manifest, &gtc).unwrap();
        assert_eq!(normalized.len(), 6);
        assert_eq!(normalized[0], (1000.0, 1000.0));
        assert_eq!(normalized[1], (995.0, 40.0));
    }

    #[test]
    fn test_missing_transform() {
        let manifest = standard_manifest();
        let fixture = GtcFixture {
            xforms: SIMPLE_GTC.xforms[..1].to_vec(),
            ..SIMPLE_GTC.clone()
        };
        let gtc = GtcFile::from_bytes(&fixture.to_bytes(), GtcSections::ALL).unwrap();

        assert!(matches!(
            normalize_raw(&manifest, &gtc),
            Err(CalibrationError::MissingTransform { norm_id: 2 })
        ));
    }
}
