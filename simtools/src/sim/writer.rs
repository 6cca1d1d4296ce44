use std::io::Write;

use binrw::BinWrite;
use byteorder::{LittleEndian, WriteBytesExt};
use log::{debug, trace};

use crate::sim::data::SimHeader;
use crate::sim::no_seek::NoSeek;
use crate::sim::{NumberFormat, SimError, SimResult, DEFAULT_SAMPLE_NAME_SIZE, SIM_VERSION};

/// A builder for `SimWriterParams`.
#[derive(Debug, Clone)]
pub struct SimWriterParamsBuilder {
    sample_name_size: u16,
}

impl SimWriterParamsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sample_name_size: DEFAULT_SAMPLE_NAME_SIZE,
        }
    }

    /// Sets the width of the NUL-padded sample name field.
    pub fn sample_name_size(&mut self, sample_name_size: u16) -> &mut Self {
        let mut new = self;
        new.sample_name_size = sample_name_size;
        new
    }

    pub fn build(&self) -> SimWriterParams {
        SimWriterParams {
            sample_name_size: self.sample_name_size,
        }
    }
}

impl Default for SimWriterParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct SimWriterParams {
    sample_name_size: u16,
}

impl SimWriterParams {
    #[must_use]
    pub fn builder() -> SimWriterParamsBuilder {
        SimWriterParamsBuilder::new()
    }
}

impl Default for SimWriterParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Streaming SIM writer. The header must be written first, then exactly
/// `num_samples` samples appended, then the writer finished.
#[derive(Debug)]
pub struct SimWriter<W> {
    writer: NoSeek<W>,
    params: SimWriterParams,
    header: Option<SimHeader>,
    samples_written: u32,
    name_buffer: Vec<u8>,
}

impl<W: Write> SimWriter<W> {
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self::with_params(writer, SimWriterParams::default())
    }

    #[must_use]
    pub fn with_params(writer: W, params: SimWriterParams) -> Self {
        let name_buffer = vec![0; usize::from(params.sample_name_size)];
        Self {
            writer: NoSeek::new(writer),
            params,
            header: None,
            samples_written: 0,
            name_buffer,
        }
    }

    pub fn write_header(
        &mut self,
        num_samples: u32,
        num_probes: u32,
        num_channels: u8,
        number_format: NumberFormat,
    ) -> SimResult<()> {
        if self.header.is_some() {
            return Err(SimError::HeaderAlreadyWritten);
        }
        if number_format == NumberFormat::ScaledInteger {
            return Err(SimError::UnsupportedNumberFormat(number_format));
        }

        let header = SimHeader {
            version: SIM_VERSION,
            sample_name_size: self.params.sample_name_size,
            num_samples,
            num_probes,
            num_channels,
            number_format: number_format.code(),
        };
        header.write_to(&mut self.writer)?;
        debug!(
            "Wrote SIM header: {} samples, {} probes, {} channels, {} values",
            num_samples, num_probes, num_channels, number_format
        );
        self.header = Some(header);

        Ok(())
    }

    /// Appends a sample record. `values` must hold `num_probes * num_channels`
    /// intensities in probe-major, channel-minor order. With the integer
    /// format, values are rounded and saturated to the `u16` range.
    pub fn append_sample(&mut self, name: &str, values: &[f32]) -> SimResult<()> {
        let header = self.header.ok_or(SimError::HeaderNotWritten)?;
        if self.samples_written >= header.num_samples {
            return Err(SimError::TooManySamples(header.num_samples));
        }
        let expected = header.values_per_sample();
        if values.len() != expected {
            return Err(SimError::StrideMismatch {
                expected,
                actual: values.len(),
            });
        }
        let name_bytes = name.as_bytes();
        if name_bytes.len() > self.name_buffer.len() {
            return Err(SimError::SampleNameTooLong {
                name: name.to_owned(),
                max_len: self.name_buffer.len(),
            });
        }

        self.name_buffer.fill(0);
        self.name_buffer[..name_bytes.len()].copy_from_slice(name_bytes);
        self.writer.write_all(&self.name_buffer)?;

        match header.number_format()? {
            NumberFormat::Float => {
                for &value in values {
                    self.writer.write_f32::<LittleEndian>(value)?;
                }
            }
            _ => {
                for &value in values {
                    self.writer.write_u16::<LittleEndian>(value.round() as u16)?;
                }
            }
        }

        self.samples_written += 1;
        trace!("Appended SIM sample #{}: {}", self.samples_written, name);
        Ok(())
    }

    #[must_use]
    pub fn samples_written(&self) -> u32 {
        self.samples_written
    }

    /// Flushes the stream and returns it, verifying that every declared
    /// sample has been appended.
    pub fn finish(mut self) -> SimResult<W> {
        let header = self.header.ok_or(SimError::HeaderNotWritten)?;
        if self.samples_written != header.num_samples {
            return Err(SimError::SampleCountMismatch {
                declared: header.num_samples,
                written: self.samples_written,
            });
        }

        self.writer.flush()?;
        debug!(
            "Finished SIM file: {} samples, {} bytes",
            self.samples_written,
            self.writer.position()
        );
        Ok(self.writer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use crate::sim::writer::{SimWriter, SimWriterParams};
    use crate::sim::{NumberFormat, SimError};

    #[test]
    fn test_integer_values_saturate() {
        let mut writer = SimWriter::new(Vec::new());
        writer.write_header(1, 1, 2, NumberFormat::Integer).unwrap();
        writer.append_sample("s", &[70000.0, 12.4]).unwrap();
        let data = writer.finish().unwrap();

        let values = &data[16 + 255..];
        assert_eq!(values, &[0xFF, 0xFF, 12, 0]);
    }

    #[test]
    fn test_custom_name_size() {
        let params = SimWriterParams::builder().sample_name_size(8).build();
        let mut writer = SimWriter::with_params(Vec::new(), params);
        writer.write_header(1, 1, 1, NumberFormat::Float).unwrap();
        writer.append_sample("abc", &[1.5]).unwrap();
        let data = writer.finish().unwrap();

        assert_eq!(data.len(), 16 + 8 + 4);
        assert_eq!(&data[16..24], b"abc\0\0\0\0\0");
    }

    #[test]
    fn test_name_too_long() {
        let params = SimWriterParams::builder().sample_name_size(4).build();
        let mut writer = SimWriter::with_params(Vec::new(), params);
        writer.write_header(1, 1, 1, NumberFormat::Float).unwrap();

        assert!(matches!(
            writer.append_sample("too long", &[1.0]),
            Err(SimError::SampleNameTooLong { max_len: 4, .. })
        ));
    }

    #[test]
    fn test_stride_mismatch() {
        let mut writer = SimWriter::new(Vec::new());
        writer.write_header(1, 3, 2, NumberFormat::Float).unwrap();

        assert!(matches!(
            writer.append_sample("s", &[1.0; 5]),
            Err(SimError::StrideMismatch {
                expected: 6,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_sample_count_enforced() {
        let mut writer = SimWriter::new(Vec::new());
        assert!(matches!(
            writer.append_sample("s", &[]),
            Err(SimError::HeaderNotWritten)
        ));
        writer.write_header(1, 1, 1, NumberFormat::Float).unwrap();
        assert!(matches!(
            writer.write_header(1, 1, 1, NumberFormat::Float),
            Err(SimError::HeaderAlreadyWritten)
        ));
        writer.append_sample("a", &[1.0]).unwrap();
        assert!(matches!(
            writer.append_sample("b", &[1.0]),
            Err(SimError::TooManySamples(1))
        ));
    }

    #[test]
    fn test_finish_with_missing_samples() {
        let mut writer = SimWriter::new(Vec::new());
        writer.write_header(2, 1, 1, NumberFormat::Float).unwrap();
        writer.append_sample("a", &[1.0]).unwrap();

        assert!(matches!(
            writer.finish(),
            Err(SimError::SampleCountMismatch {
                declared: 2,
                written: 1
            })
        ));
    }

    #[test]
    fn test_scaled_integer_rejected() {
        let mut writer = SimWriter::new(Vec::new());
        assert!(matches!(
            writer.write_header(1, 1, 1, NumberFormat::ScaledInteger),
            Err(SimError::UnsupportedNumberFormat(NumberFormat::ScaledInteger))
        ));
    }
}
