use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use binrw::BinRead;
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace};

use crate::sim::data::SimHeader;
use crate::sim::{
    NumberFormat, SampleIntensities, SimError, SimResult, SimSample, SIM_HEADER_LEN,
};

/// Sequential reader of SIM sample records.
///
/// The reader can be rewound with [`SimReader::reset`] if the underlying
/// stream supports seeking back to the first record.
#[derive(Debug)]
pub struct SimReader<R> {
    reader: R,
    header: SimHeader,
    number_format: NumberFormat,
    samples_read: u32,
    record_length: usize,
    buffer: Vec<u8>,
}

impl SimReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let file = File::open(path.as_ref())?;
        debug!("Opening SIM file {}", path.as_ref().display());
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> SimReader<R> {
    /// Reads and validates the header, leaving the stream at the first
    /// sample record.
    ///
    /// # Examples
    /// ```
    /// use std::io::Cursor;
    ///
    /// use simtools::sim::reader::SimReader;
    /// use simtools::sim::writer::SimWriter;
    /// use simtools::sim::NumberFormat;
    ///
    /// let mut writer = SimWriter::new(Vec::new());
    /// writer.write_header(1, 2, 2, NumberFormat::Float).unwrap();
    /// writer.append_sample("sample", &[1.0, 2.0, 3.0, 4.0]).unwrap();
    /// let data = writer.finish().unwrap();
    ///
    /// let mut reader = SimReader::new(Cursor::new(data)).unwrap();
    /// let sample = reader.read_next_sample().unwrap().unwrap();
    /// assert_eq!(sample.name, "sample");
    /// assert!(reader.read_next_sample().unwrap().is_none());
    /// ```
    pub fn new(mut reader: R) -> SimResult<Self> {
        let header = SimHeader::read(&mut reader)?;
        let number_format = header.number_format()?;
        let record_length = header.record_length()?;
        debug!(
            "SIM header: {} samples, {} probes, {} channels, {} values, record length {}",
            header.num_samples,
            header.num_probes,
            header.num_channels,
            number_format,
            record_length
        );

        Ok(Self {
            reader,
            header,
            number_format,
            samples_read: 0,
            record_length,
            buffer: Vec::new(),
        })
    }

    #[must_use]
    pub fn header(&self) -> &SimHeader {
        &self.header
    }

    #[must_use]
    pub fn number_format(&self) -> NumberFormat {
        self.number_format
    }

    #[must_use]
    pub fn samples_read(&self) -> u32 {
        self.samples_read
    }

    /// Reads the next sample record, or returns `None` once all samples
    /// declared in the header have been read.
    pub fn read_next_sample(&mut self) -> SimResult<Option<SimSample>> {
        if self.samples_read >= self.header.num_samples {
            return Ok(None);
        }

        // allocation is bounded by the bytes actually present in the stream
        self.buffer.clear();
        (&mut self.reader)
            .take(self.record_length as u64)
            .read_to_end(&mut self.buffer)?;
        if self.buffer.len() < self.record_length {
            return Err(SimError::Truncated);
        }
        self.samples_read += 1;

        let name_size = usize::from(self.header.sample_name_size);
        let (name_bytes, value_bytes) = self.buffer.split_at(name_size);
        let name = decode_sample_name(name_bytes);

        let num_values = self.header.values_per_sample();
        let intensities = match self.number_format {
            NumberFormat::Float => {
                let mut values = vec![0.0; num_values];
                LittleEndian::read_f32_into(value_bytes, &mut values);
                SampleIntensities::Float(values)
            }
            _ => {
                let mut values = vec![0; num_values];
                LittleEndian::read_u16_into(value_bytes, &mut values);
                SampleIntensities::Integer(values)
            }
        };
        trace!("Read SIM sample #{}: {}", self.samples_read, name);

        Ok(Some(SimSample { name, intensities }))
    }

    /// Rewinds to the first sample record.
    pub fn reset(&mut self) -> SimResult<()> {
        self.reader.seek(SeekFrom::Start(SIM_HEADER_LEN))?;
        self.samples_read = 0;
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> Iterator for SimReader<R> {
    type Item = SimResult<SimSample>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next_sample().transpose()
    }
}

fn decode_sample_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
