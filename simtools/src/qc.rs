//! Per-sample quality control metrics computed from intensity matrices.

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::io::{Read, Seek};

use log::{debug, info};

use crate::progress::ProgressNotifier;
use crate::sim::reader::SimReader;
use crate::sim::{SimError, SimSample};

#[derive(Debug)]
pub enum QcError {
    SimError(SimError),
    /// The metric requires a different number of intensity channels.
    ChannelCount { expected: u8, actual: u8 },
}

impl From<SimError> for QcError {
    fn from(e: SimError) -> Self {
        Self::SimError(e)
    }
}

impl Display for QcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QcError::SimError(e) => write!(f, "SIM error: {}", e),
            QcError::ChannelCount { expected, actual } => write!(
                f,
                "Metric is only defined for {} intensity channels, found {}",
                expected, actual
            ),
        }
    }
}

impl Error for QcError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            QcError::SimError(e) => Some(e),
            _ => None,
        }
    }
}

pub type QcResult<T> = Result<T, QcError>;

/// Value of a metric for a single sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMetric {
    pub sample: String,
    pub value: f64,
}

/// Euclidean norm of the channel intensities of every probe.
fn probe_magnitudes(sample: &SimSample, num_channels: usize) -> Vec<f64> {
    sample
        .intensities
        .to_f64_vec()
        .chunks(num_channels.max(1))
        .map(|channels| channels.iter().map(|value| value * value).sum::<f64>().sqrt())
        .collect()
}

/// Mean probe magnitude of each sample, each probe normalized by its mean
/// magnitude across all samples.
///
/// Reads the matrix twice, so the reader must support [`SimReader::reset`].
pub fn magnitude<R: Read + Seek>(
    reader: &mut SimReader<R>,
    progress: &dyn ProgressNotifier,
) -> QcResult<Vec<SampleMetric>> {
    let header = *reader.header();
    let num_samples = header.num_samples;
    let num_channels = usize::from(header.num_channels);
    progress.set_iter_num(2 * u64::from(num_samples));

    reader.reset()?;
    let mut probe_means = vec![0.0; header.num_probes as usize];
    while let Some(sample) = reader.read_next_sample()? {
        for (total, magnitude) in probe_means
            .iter_mut()
            .zip(probe_magnitudes(&sample, num_channels))
        {
            *total += magnitude;
        }
        progress.inc_iter();
    }
    for total in &mut probe_means {
        *total /= f64::from(num_samples);
    }
    debug!("Computed mean magnitude of {} probes", probe_means.len());

    reader.reset()?;
    let mut metrics = Vec::with_capacity(num_samples as usize);
    while let Some(sample) = reader.read_next_sample()? {
        let magnitudes = probe_magnitudes(&sample, num_channels);
        let total: f64 = magnitudes
            .iter()
            .zip(&probe_means)
            .map(|(magnitude, mean)| magnitude / mean)
            .sum();
        metrics.push(SampleMetric {
            sample: sample.name,
            value: total / probe_means.len() as f64,
        });
        progress.inc_iter();
    }

    info!("Computed magnitude for {} samples", metrics.len());
    Ok(metrics)
}

/// Mean of `y - x` over the probes of each sample. Defined only for
/// two-channel matrices.
pub fn xy_difference<R: Read + Seek>(
    reader: &mut SimReader<R>,
    progress: &dyn ProgressNotifier,
) -> QcResult<Vec<SampleMetric>> {
    let header = *reader.header();
    if header.num_channels != 2 {
        return Err(QcError::ChannelCount {
            expected: 2,
            actual: header.num_channels,
        });
    }
    progress.set_iter_num(u64::from(header.num_samples));

    reader.reset()?;
    let mut metrics = Vec::with_capacity(header.num_samples as usize);
    while let Some(sample) = reader.read_next_sample()? {
        let values = sample.intensities.to_f64_vec();
        let total: f64 = values.chunks_exact(2).map(|xy| xy[1] - xy[0]).sum();
        metrics.push(SampleMetric {
            sample: sample.name,
            value: total / f64::from(header.num_probes),
        });
        progress.inc_iter();
    }

    info!("Computed XY difference for {} samples", metrics.len());
    Ok(metrics)
}
