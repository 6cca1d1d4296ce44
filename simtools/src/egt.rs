//! Decoder for EGT cluster files: per-probe genotype counts and the
//! radius/angle statistics of the three genotype clusters.

use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::fs;
use std::io::{Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use log::{debug, info, trace};

/// Number of 4-byte fields in a single on-disk cluster record.
const RECORD_FIELDS: usize = 30;
const RECORD_COUNT_FIELDS: usize = 3;
/// Position of the first retained float within a record.
const RECORD_PARAMS_START: usize = 3;
pub const CLUSTER_PARAMS: usize = 12;
/// Stride of the skipped per-probe quality block.
const QUALITY_STRIDE: u64 = 13;
const RECORD_LEN: usize = RECORD_FIELDS * 4;
/// Smallest on-disk size of a length-prefixed string.
const MIN_STRING_LEN: usize = 2;
/// File versions accepted as little-endian before trying the opposite order.
const MAX_LITTLE_ENDIAN_VERSION: i32 = 1000;

#[derive(Debug)]
pub enum EgtError {
    IoError(std::io::Error),
    /// The file ended before all declared records were read.
    Truncated,
    /// A length-prefixed string declared a zero or negative length.
    InvalidStringLength { length: i8, position: u64 },
    InvalidProbeCount(i32),
}

impl From<std::io::Error> for EgtError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::IoError(e)
        }
    }
}

impl Display for EgtError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EgtError::IoError(e) => write!(f, "IO error: {}", e),
            EgtError::Truncated => write!(f, "EGT file is truncated"),
            EgtError::InvalidStringLength { length, position } => write!(
                f,
                "Invalid string length {} at byte offset {}",
                length, position
            ),
            EgtError::InvalidProbeCount(count) => write!(f, "Invalid probe count: {}", count),
        }
    }
}

impl Error for EgtError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EgtError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

pub type EgtResult<T> = Result<T, EgtError>;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Endianness {
    Little,
    Big,
}

/// Header and preface of a cluster file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EgtHeader {
    pub file_version: i32,
    pub gencall_version: String,
    pub cluster_version: String,
    pub call_version: String,
    pub normalization_version: String,
    pub date_created: String,
    pub mode: u8,
    pub manifest: String,
    pub data_version: i32,
    pub opa: String,
}

/// Decoded cluster file, held in parallel per-probe arrays indexed by
/// `Probe::index - 1`.
#[derive(Debug, Clone)]
pub struct ClusterFile {
    path: Option<PathBuf>,
    header: EgtHeader,
    endianness: Endianness,
    counts: Vec<[i32; 3]>,
    params: Vec<[f32; CLUSTER_PARAMS]>,
    names: Vec<String>,
    name_index: HashMap<String, usize>,
}

impl ClusterFile {
    pub fn open<P: AsRef<Path>>(path: P) -> EgtResult<Self> {
        let path = path.as_ref();
        debug!("Opening EGT file {}", path.display());
        let data = fs::read(path)?;
        let mut cluster_file = Self::from_bytes(&data)?;
        cluster_file.path = Some(path.to_owned());
        Ok(cluster_file)
    }

    pub fn read<R: Read>(mut reader: R) -> EgtResult<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    pub fn from_bytes(data: &[u8]) -> EgtResult<Self> {
        let mut decoder = EgtDecoder::new(data);
        decoder.decode()
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn header(&self) -> &EgtHeader {
        &self.header
    }

    #[must_use]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// The 12 cluster parameters of a probe: radius deviations, radius
    /// means, angle deviations and angle means, each for the AA, AB and BB
    /// clusters.
    #[must_use]
    pub fn get_cluster_params(&self, probe_index: usize) -> Option<&[f32; CLUSTER_PARAMS]> {
        self.params.get(probe_index)
    }

    #[must_use]
    pub fn get_mean_radius(&self, probe_index: usize) -> Option<[f32; 3]> {
        self.get_cluster_params(probe_index)
            .map(|params| [params[3], params[4], params[5]])
    }

    #[must_use]
    pub fn get_mean_angle(&self, probe_index: usize) -> Option<[f32; 3]> {
        self.get_cluster_params(probe_index)
            .map(|params| [params[9], params[10], params[11]])
    }

    /// Genotype counts (AA, AB, BB) of the probe.
    #[must_use]
    pub fn get_counts(&self, probe_index: usize) -> Option<[i32; 3]> {
        self.counts.get(probe_index).copied()
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn find_probe_index(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }
}

struct EgtDecoder<'a> {
    cursor: Cursor<&'a [u8]>,
    endianness: Endianness,
}

impl<'a> EgtDecoder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
            endianness: Endianness::Little,
        }
    }

    fn decode(&mut self) -> EgtResult<ClusterFile> {
        let file_version = self.read_version()?;
        let gencall_version = self.read_string()?;
        let cluster_version = self.read_string()?;
        let call_version = self.read_string()?;
        let normalization_version = self.read_string()?;
        let date_created = self.read_string()?;
        let mode = self.cursor.read_u8()?;
        let manifest = self.read_string()?;

        let data_version = self.read_i32()?;
        let opa = self.read_string()?;
        let probe_count = self.read_i32()?;
        let probe_count =
            usize::try_from(probe_count).map_err(|_| EgtError::InvalidProbeCount(probe_count))?;

        let header = EgtHeader {
            file_version,
            gencall_version,
            cluster_version,
            call_version,
            normalization_version,
            date_created,
            mode,
            manifest,
            data_version,
            opa,
        };
        debug!(
            "EGT header: version {} ({:?} endian), mode {}, {} probes",
            header.file_version, self.endianness, header.mode, probe_count
        );

        // capacity is bounded by the bytes left in the file
        let capacity = probe_count.min(self.remaining() / RECORD_LEN);
        let mut counts = Vec::with_capacity(capacity);
        let mut params = Vec::with_capacity(capacity);
        for _ in 0..probe_count {
            let (record_counts, record_params) = self.read_record()?;
            counts.push(record_counts);
            params.push(record_params);
        }
        trace!("Read {} cluster records", probe_count);

        self.skip(probe_count as u64 * QUALITY_STRIDE)?;
        for _ in 0..probe_count {
            self.read_string()?;
        }

        let name_capacity = probe_count.min(self.remaining() / MIN_STRING_LEN);
        let mut names = Vec::with_capacity(name_capacity);
        for _ in 0..probe_count {
            names.push(self.read_string()?);
        }
        let name_index = names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), index))
            .collect();

        info!("Decoded cluster statistics for {} probes", probe_count);
        Ok(ClusterFile {
            path: None,
            header,
            endianness: self.endianness,
            counts,
            params,
            names,
            name_index,
        })
    }

    fn read_version(&mut self) -> EgtResult<i32> {
        let mut bytes = [0; 4];
        self.cursor.read_exact(&mut bytes)?;

        let little = i32::from_le_bytes(bytes);
        if (0..=MAX_LITTLE_ENDIAN_VERSION).contains(&little) {
            self.endianness = Endianness::Little;
            Ok(little)
        } else {
            self.endianness = Endianness::Big;
            Ok(i32::from_be_bytes(bytes))
        }
    }

    fn read_i32(&mut self) -> EgtResult<i32> {
        let value = match self.endianness {
            Endianness::Little => self.cursor.read_i32::<LittleEndian>()?,
            Endianness::Big => self.cursor.read_i32::<BigEndian>()?,
        };
        Ok(value)
    }

    fn read_f32(&mut self) -> EgtResult<f32> {
        let value = match self.endianness {
            Endianness::Little => self.cursor.read_f32::<LittleEndian>()?,
            Endianness::Big => self.cursor.read_f32::<BigEndian>()?,
        };
        Ok(value)
    }

    fn read_string(&mut self) -> EgtResult<String> {
        let position = self.cursor.position();
        let length = self.cursor.read_i8()?;
        if length <= 0 {
            return Err(EgtError::InvalidStringLength { length, position });
        }

        let mut bytes = vec![0; length as usize];
        self.cursor.read_exact(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn read_record(&mut self) -> EgtResult<([i32; 3], [f32; CLUSTER_PARAMS])> {
        let mut counts = [0; 3];
        for count in &mut counts {
            *count = self.read_i32()?;
        }

        let mut params = [0.0; CLUSTER_PARAMS];
        for field in RECORD_COUNT_FIELDS..RECORD_FIELDS {
            let value = self.read_f32()?;
            if let Some(param) = field
                .checked_sub(RECORD_PARAMS_START)
                .and_then(|i| params.get_mut(i))
            {
                *param = value;
            }
        }

        Ok((counts, params))
    }

    fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len();
        len.saturating_sub(self.cursor.position() as usize)
    }

    fn skip(&mut self, len: u64) -> EgtResult<()> {
        let target = self.cursor.position() + len;
        if target > self.cursor.get_ref().len() as u64 {
            return Err(EgtError::Truncated);
        }
        self.cursor.set_position(target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::_internal_test_data::{EgtFixture, EgtProbeFixture, SIMPLE_EGT};
    use crate::egt::{ClusterFile, EgtError, Endianness};

    #[test_log::test]
    fn test_single_probe_file() {
        let cluster_file = ClusterFile::from_bytes(&SIMPLE_EGT.to_bytes()).unwrap();

        assert_eq!(cluster_file.header().file_version, 3);
        assert_eq!(cluster_file.header().mode, 1);
        assert_eq!(cluster_file.endianness(), Endianness::Little);
        assert_eq!(cluster_file.len(), 1);
        assert_eq!(cluster_file.names(), &["P1".to_owned()]);
        assert_eq!(cluster_file.get_counts(0), Some([10, 20, 10]));
        assert_eq!(cluster_file.get_mean_angle(0), Some([0.03, 0.50, 0.98]));
        assert_eq!(cluster_file.find_probe_index("P1"), Some(0));
        assert_eq!(cluster_file.find_probe_index("P2"), None);
        assert_eq!(cluster_file.get_mean_angle(1), None);
    }

    #[test]
    fn test_parameter_layout() {
        let fixture = EgtFixture {
            probes: vec![EgtProbeFixture {
                name: "rs1".to_owned(),
                counts: [1, 2, 3],
                params: [
                    0.1, 0.2, 0.3, 1.0, 2.0, 3.0, 0.01, 0.02, 0.03, 0.1, 0.5, 0.9,
                ],
            }],
            ..SIMPLE_EGT.clone()
        };
        let cluster_file = ClusterFile::from_bytes(&fixture.to_bytes()).unwrap();

        assert_eq!(cluster_file.get_mean_radius(0), Some([1.0, 2.0, 3.0]));
        assert_eq!(cluster_file.get_mean_angle(0), Some([0.1, 0.5, 0.9]));
        assert_eq!(
            cluster_file.get_cluster_params(0).unwrap()[6..9],
            [0.01, 0.02, 0.03]
        );
    }

    #[test]
    fn test_big_endian_file() {
        let fixture = EgtFixture {
            big_endian: true,
            ..SIMPLE_EGT.clone()
        };
        let cluster_file = ClusterFile::from_bytes(&fixture.to_bytes()).unwrap();

        assert_eq!(cluster_file.endianness(), Endianness::Big);
        assert_eq!(cluster_file.header().file_version, 3);
        assert_eq!(cluster_file.get_counts(0), Some([10, 20, 10]));
        assert_eq!(cluster_file.get_mean_angle(0), Some([0.03, 0.50, 0.98]));
    }

    #[test]
    fn test_empty_string_is_rejected() {
        let fixture = EgtFixture {
            gencall_version: String::new(),
            ..SIMPLE_EGT.clone()
        };

        assert!(matches!(
            ClusterFile::from_bytes(&fixture.to_bytes()),
            Err(EgtError::InvalidStringLength {
                length: 0,
                position: 4
            })
        ));
    }

    #[test]
    fn test_truncated_file() {
        let mut data = SIMPLE_EGT.to_bytes();
        data.truncate(data.len() - 2);

        assert!(matches!(
            ClusterFile::from_bytes(&data),
            Err(EgtError::Truncated)
        ));
    }

    #[test]
    fn test_oversized_probe_count_is_truncated() {
        let fixture = EgtFixture {
            probes: Vec::new(),
            ..SIMPLE_EGT.clone()
        };
        let mut data = fixture.to_bytes();
        let count_offset = data.len() - 4;
        data[count_offset..].copy_from_slice(&i32::MAX.to_le_bytes());

        assert!(matches!(
            ClusterFile::from_bytes(&data),
            Err(EgtError::Truncated)
        ));
    }
}
