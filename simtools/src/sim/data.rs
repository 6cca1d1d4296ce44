use std::fmt::{Display, Formatter};

use binrw::binrw;

use crate::sim::{NumberFormat, SimError, SimResult};

/// Fixed 16-byte header at the start of every SIM file.
#[binrw]
#[brw(little, magic = b"sim")]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SimHeader {
    pub version: u8,
    pub sample_name_size: u16,
    pub num_samples: u32,
    pub num_probes: u32,
    pub num_channels: u8,
    pub number_format: u8,
}

impl SimHeader {
    /// Decodes the number format code, rejecting codes this crate cannot
    /// read or write.
    pub fn number_format(&self) -> SimResult<NumberFormat> {
        let format = NumberFormat::from_code(self.number_format)
            .ok_or(SimError::UnknownNumberFormat(self.number_format))?;
        if format == NumberFormat::ScaledInteger {
            return Err(SimError::UnsupportedNumberFormat(format));
        }
        Ok(format)
    }

    /// Size in bytes of a single sample record: the name field followed by
    /// `num_probes * num_channels` values.
    pub fn record_length(&self) -> SimResult<usize> {
        let element_size = self.number_format()?.element_size();
        usize::try_from(self.num_probes)
            .ok()
            .and_then(|probes| probes.checked_mul(usize::from(self.num_channels)))
            .and_then(|values| values.checked_mul(element_size))
            .and_then(|values_len| values_len.checked_add(usize::from(self.sample_name_size)))
            .ok_or(SimError::RecordTooLarge {
                num_probes: self.num_probes,
                num_channels: self.num_channels,
            })
    }

    #[must_use]
    pub fn values_per_sample(&self) -> usize {
        self.num_probes as usize * usize::from(self.num_channels)
    }
}

impl Display for SimHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "version:          {}", self.version)?;
        writeln!(f, "sample name size: {}", self.sample_name_size)?;
        writeln!(f, "samples:          {}", self.num_samples)?;
        writeln!(f, "probes:           {}", self.num_probes)?;
        writeln!(f, "channels:         {}", self.num_channels)?;
        match NumberFormat::from_code(self.number_format) {
            Some(format) => write!(f, "number format:    {}", format),
            None => write!(f, "number format:    unknown ({})", self.number_format),
        }
    }
}
