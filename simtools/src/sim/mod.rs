//! Reading and writing SIM files: a 16-byte header followed by fixed-size
//! sample records, each holding a NUL-padded sample name and the
//! probe-major, channel-minor intensity matrix of that sample.

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::io::ErrorKind;

use itertools::Either;

mod data;
pub mod no_seek;
pub mod reader;
pub mod writer;

pub use data::SimHeader;

/// Size of the encoded [`SimHeader`].
pub const SIM_HEADER_LEN: u64 = 16;
pub const SIM_VERSION: u8 = 1;
pub const DEFAULT_SAMPLE_NAME_SIZE: u16 = 255;

/// Encoding of intensity values within sample records.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NumberFormat {
    /// IEEE-754 32-bit floats.
    Float,
    /// Unsigned 16-bit integers.
    Integer,
    /// Scaled 16-bit integers. Recognized in headers, never decoded.
    ScaledInteger,
}

impl NumberFormat {
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(NumberFormat::Float),
            1 => Some(NumberFormat::Integer),
            2 => Some(NumberFormat::ScaledInteger),
            _ => None,
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            NumberFormat::Float => 0,
            NumberFormat::Integer => 1,
            NumberFormat::ScaledInteger => 2,
        }
    }

    /// Size in bytes of a single encoded value.
    #[must_use]
    pub const fn element_size(self) -> usize {
        match self {
            NumberFormat::Float => 4,
            NumberFormat::Integer | NumberFormat::ScaledInteger => 2,
        }
    }
}

impl Display for NumberFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NumberFormat::Float => write!(f, "float"),
            NumberFormat::Integer => write!(f, "integer"),
            NumberFormat::ScaledInteger => write!(f, "scaled integer"),
        }
    }
}

/// Error occurring while reading or writing a SIM file.
#[derive(Debug)]
pub enum SimError {
    IoError(std::io::Error),
    SerializeError(binrw::Error),
    /// The file does not start with the `sim` tag.
    InvalidMagic,
    /// The stream ended in the middle of the header or a sample record.
    Truncated,
    UnknownNumberFormat(u8),
    UnsupportedNumberFormat(NumberFormat),
    /// The record size implied by the header does not fit in memory.
    RecordTooLarge { num_probes: u32, num_channels: u8 },
    /// A sample does not carry `num_probes * num_channels` values.
    StrideMismatch { expected: usize, actual: usize },
    SampleNameTooLong { name: String, max_len: usize },
    HeaderNotWritten,
    HeaderAlreadyWritten,
    /// More samples were appended than the header declared.
    TooManySamples(u32),
    /// The writer was finished before all declared samples were appended.
    SampleCountMismatch { declared: u32, written: u32 },
}

impl From<std::io::Error> for SimError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::IoError(e)
        }
    }
}

impl From<binrw::Error> for SimError {
    fn from(e: binrw::Error) -> Self {
        match e {
            binrw::Error::BadMagic { .. } => Self::InvalidMagic,
            binrw::Error::Io(e) => e.into(),
            e => Self::SerializeError(e),
        }
    }
}

impl Display for SimError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SimError::IoError(e) => write!(f, "IO error: {}", e),
            SimError::SerializeError(e) => write!(f, "Serialize error: {}", e),
            SimError::InvalidMagic => write!(f, "Not a SIM file (missing `sim` tag)"),
            SimError::Truncated => write!(f, "SIM file is truncated"),
            SimError::UnknownNumberFormat(code) => {
                write!(f, "Unknown SIM number format: {}", code)
            }
            SimError::UnsupportedNumberFormat(format) => {
                write!(f, "Unsupported SIM number format: {}", format)
            }
            SimError::RecordTooLarge {
                num_probes,
                num_channels,
            } => write!(
                f,
                "SIM record of {} probes by {} channels is too large",
                num_probes, num_channels
            ),
            SimError::StrideMismatch { expected, actual } => write!(
                f,
                "Sample has {} values, but the header requires {}",
                actual, expected
            ),
            SimError::SampleNameTooLong { name, max_len } => write!(
                f,
                "Sample name `{}` is longer than the {} byte name field",
                name, max_len
            ),
            SimError::HeaderNotWritten => write!(f, "SIM header has not been written yet"),
            SimError::HeaderAlreadyWritten => write!(f, "SIM header has already been written"),
            SimError::TooManySamples(declared) => write!(
                f,
                "Header declares {} samples, cannot append another one",
                declared
            ),
            SimError::SampleCountMismatch { declared, written } => write!(
                f,
                "Header declares {} samples, but {} were written",
                declared, written
            ),
        }
    }
}

impl Error for SimError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SimError::IoError(e) => Some(e),
            SimError::SerializeError(e) => Some(e),
            _ => None,
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;

/// Intensity values of a single sample, in probe-major, channel-minor order.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleIntensities {
    Float(Vec<f32>),
    Integer(Vec<u16>),
}

impl SampleIntensities {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            SampleIntensities::Float(values) => values.len(),
            SampleIntensities::Integer(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn number_format(&self) -> NumberFormat {
        match self {
            SampleIntensities::Float(_) => NumberFormat::Float,
            SampleIntensities::Integer(_) => NumberFormat::Integer,
        }
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        match self {
            SampleIntensities::Float(values) => {
                Either::Left(values.iter().map(|&value| f64::from(value)))
            }
            SampleIntensities::Integer(values) => {
                Either::Right(values.iter().map(|&value| f64::from(value)))
            }
        }
    }

    #[must_use]
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.values().collect()
    }
}

/// A single decoded sample record.
#[derive(Debug, Clone, PartialEq)]
pub struct SimSample {
    pub name: String,
    pub intensities: SampleIntensities,
}

impl SimSample {
    /// Sum of all intensity values of this sample.
    #[must_use]
    pub fn total_intensity(&self) -> f64 {
        self.intensities.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use crate::sim::{NumberFormat, SampleIntensities, SimSample};

    #[test]
    fn test_number_format_codes() {
        for format in [
            NumberFormat::Float,
            NumberFormat::Integer,
            NumberFormat::ScaledInteger,
        ] {
            assert_eq!(NumberFormat::from_code(format.code()), Some(format));
        }
        assert_eq!(NumberFormat::from_code(3), None);
        assert_eq!(NumberFormat::Float.element_size(), 4);
        assert_eq!(NumberFormat::Integer.element_size(), 2);
    }

    #[test]
    fn test_total_intensity() {
        let sample = SimSample {
            name: "s1".to_owned(),
            intensities: SampleIntensities::Integer(vec![1, 2, 3, 4]),
        };
        assert_eq!(sample.total_intensity(), 10.0);
        assert_eq!(sample.intensities.len(), 4);
        assert_eq!(sample.intensities.number_format(), NumberFormat::Integer);
    }
}
