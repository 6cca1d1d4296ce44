//! Decoder for GTC sample-call files.
//!
//! A GTC file starts with a table of contents of `(field id, offset)` pairs.
//! Scalar metadata is always decoded; the transform table and per-probe
//! arrays are decoded only when requested through [`GtcSections`].

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use derive_more::BitOr;
use log::debug;
use serde::Serialize;

use crate::gtc::reader::GtcDecoder;
use crate::gtc::xform::XForm;

pub(crate) mod data;
mod reader;
pub mod xform;

/// Scores at or below this value are treated as no-calls by
/// [`GtcFile::corrected_pass_rate`].
pub const MIN_CALLED_SCORE: f32 = 1e-8;

pub const GENOTYPE_NO_CALL: u8 = 0;
pub const GENOTYPE_AA: u8 = 1;
pub const GENOTYPE_AB: u8 = 2;
pub const GENOTYPE_BB: u8 = 3;

/// Set of optional GTC sections to decode.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, BitOr)]
pub struct GtcSections(u8);

impl GtcSections {
    pub const NONE: GtcSections = GtcSections(0);
    pub const XFORM: GtcSections = GtcSections(1);
    pub const CONTROL: GtcSections = GtcSections(2);
    pub const INTENSITY: GtcSections = GtcSections(4);
    pub const GENOTYPES: GtcSections = GtcSections(8);
    pub const BASECALLS: GtcSections = GtcSections(16);
    pub const SCORES: GtcSections = GtcSections(32);
    pub const ALL: GtcSections = GtcSections(255);

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: GtcSections) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for GtcSections {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug)]
pub enum GtcError {
    IoError(std::io::Error),
    SerializeError(binrw::Error),
    /// The file does not start with the `gtc` tag.
    InvalidMagic,
    Truncated,
    /// A section offset or its declared length points past the end of file.
    SectionOutOfBounds { id: u16, offset: u32, file_len: usize },
}

impl From<std::io::Error> for GtcError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::IoError(e)
        }
    }
}

impl From<binrw::Error> for GtcError {
    fn from(e: binrw::Error) -> Self {
        match e {
            binrw::Error::BadMagic { .. } => Self::InvalidMagic,
            binrw::Error::Io(e) => e.into(),
            e => Self::SerializeError(e),
        }
    }
}

impl Display for GtcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GtcError::IoError(e) => write!(f, "IO error: {}", e),
            GtcError::SerializeError(e) => write!(f, "Serialize error: {}", e),
            GtcError::InvalidMagic => write!(f, "Not a GTC file (missing `gtc` tag)"),
            GtcError::Truncated => write!(f, "GTC file is truncated"),
            GtcError::SectionOutOfBounds {
                id,
                offset,
                file_len,
            } => write!(
                f,
                "Section {} at offset {} exceeds the file length ({} bytes)",
                id, offset, file_len
            ),
        }
    }
}

impl Error for GtcError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GtcError::IoError(e) => Some(e),
            GtcError::SerializeError(e) => Some(e),
            _ => None,
        }
    }
}

pub type GtcResult<T> = Result<T, GtcError>;

/// Two-letter base call of a probe, e.g. `AG`. `--` marks a no-call.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct BaseCall(pub [u8; 2]);

impl BaseCall {
    #[must_use]
    pub fn first(self) -> char {
        char::from(self.0[0])
    }

    #[must_use]
    pub fn second(self) -> char {
        char::from(self.0[1])
    }
}

impl Display for BaseCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.first(), self.second())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScannerInfo {
    #[serde(rename = "scanner_name")]
    pub name: String,
    pub pmt_green: i32,
    pub pmt_red: i32,
    #[serde(rename = "scanner_version")]
    pub version: String,
    pub imaging_user: String,
}

/// Scalar fields of a GTC file, decoded regardless of the requested sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GtcMetadata {
    pub probe_count: u32,
    pub sample_name: String,
    pub sample_plate: String,
    pub sample_well: String,
    pub cluster_file: String,
    pub manifest: String,
    pub imaging_date: String,
    pub autocall_date: String,
    pub autocall_version: String,
    #[serde(flatten)]
    pub scanner: ScannerInfo,
}

/// A decoded GTC file. Per-probe arrays are indexed by `Probe::index - 1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GtcFile {
    path: Option<PathBuf>,
    version: u8,
    metadata: GtcMetadata,
    xforms: Vec<XForm>,
    x_raw_control: Vec<u16>,
    y_raw_control: Vec<u16>,
    x_raw: Vec<u16>,
    y_raw: Vec<u16>,
    genotypes: Vec<u8>,
    base_calls: Vec<BaseCall>,
    scores: Vec<f32>,
}

impl GtcFile {
    pub fn open<P: AsRef<Path>>(path: P, sections: GtcSections) -> GtcResult<Self> {
        let path = path.as_ref();
        debug!("Opening GTC file {}", path.display());
        let data = fs::read(path)?;
        let mut gtc = Self::from_bytes(&data, sections)?;
        gtc.path = Some(path.to_owned());
        Ok(gtc)
    }

    pub fn read<R: Read>(mut reader: R, sections: GtcSections) -> GtcResult<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data, sections)
    }

    /// Decodes a GTC file held in memory.
    ///
    /// # Examples
    /// ```
    /// use simtools::gtc::{GtcError, GtcFile, GtcSections};
    ///
    /// let result = GtcFile::from_bytes(b"not a gtc file", GtcSections::ALL);
    /// assert!(matches!(result, Err(GtcError::InvalidMagic)));
    /// ```
    pub fn from_bytes(data: &[u8], sections: GtcSections) -> GtcResult<Self> {
        GtcDecoder::new(data, sections).decode()
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    #[must_use]
    pub fn metadata(&self) -> &GtcMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn probe_count(&self) -> u32 {
        self.metadata.probe_count
    }

    #[must_use]
    pub fn sample_name(&self) -> &str {
        &self.metadata.sample_name
    }

    #[must_use]
    pub fn xforms(&self) -> &[XForm] {
        &self.xforms
    }

    #[must_use]
    pub fn x_raw_control(&self) -> &[u16] {
        &self.x_raw_control
    }

    #[must_use]
    pub fn y_raw_control(&self) -> &[u16] {
        &self.y_raw_control
    }

    #[must_use]
    pub fn x_raw(&self) -> &[u16] {
        &self.x_raw
    }

    #[must_use]
    pub fn y_raw(&self) -> &[u16] {
        &self.y_raw
    }

    /// Genotype codes, see [`GENOTYPE_AA`] and friends.
    #[must_use]
    pub fn genotypes(&self) -> &[u8] {
        &self.genotypes
    }

    #[must_use]
    pub fn base_calls(&self) -> &[BaseCall] {
        &self.base_calls
    }

    #[must_use]
    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    /// Fraction of scores at or above `cutoff`; 0 when no scores were read.
    #[must_use]
    pub fn pass_rate(&self, cutoff: f64) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        let passed = self
            .scores
            .iter()
            .filter(|&&score| f64::from(score) >= cutoff)
            .count();
        passed as f64 / self.scores.len() as f64
    }

    /// Like [`GtcFile::pass_rate`], but ignores scores not above
    /// [`MIN_CALLED_SCORE`].
    #[must_use]
    pub fn corrected_pass_rate(&self, cutoff: f64) -> f64 {
        let (passed, total) = self
            .scores
            .iter()
            .filter(|&&score| score > MIN_CALLED_SCORE)
            .fold((0usize, 0usize), |(passed, total), &score| {
                (passed + usize::from(f64::from(score) >= cutoff), total + 1)
            });
        if total == 0 {
            return 0.0;
        }
        passed as f64 / total as f64
    }

    /// Scalar metadata as a JSON object. PMT gains are JSON numbers, not
    /// quoted strings, since they are decoded as integers.
    pub fn metadata_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.metadata)
    }
}

impl Display for GtcFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let m = &self.metadata;
        writeln!(f, "Number of SNPs:   {}", m.probe_count)?;
        writeln!(f, "Sample Name:      {}", m.sample_name)?;
        writeln!(f, "Sample Plate:     {}", m.sample_plate)?;
        writeln!(f, "Sample Well:      {}", m.sample_well)?;
        writeln!(f, "Cluster File:     {}", m.cluster_file)?;
        writeln!(f, "Manifest:         {}", m.manifest)?;
        writeln!(f, "Imaging Date:     {}", m.imaging_date)?;
        writeln!(f, "Autocall Date:    {}", m.autocall_date)?;
        writeln!(f, "Autocall Version: {}", m.autocall_version)?;
        writeln!(f, "Scanner Name:     {}", m.scanner.name)?;
        writeln!(f, "Pmt Green:        {}", m.scanner.pmt_green)?;
        writeln!(f, "Pmt Red:          {}", m.scanner.pmt_red)?;
        writeln!(f, "Scanner Version:  {}", m.scanner.version)?;
        writeln!(f, "Imaging User:     {}", m.scanner.imaging_user)?;
        writeln!(f, "XForm contains:   {} entries", self.xforms.len())?;
        writeln!(f, "xRawControl:      {} entries", self.x_raw_control.len())?;
        writeln!(f, "yRawControl:      {} entries", self.y_raw_control.len())?;
        writeln!(f, "xRawIntensity:    {} entries", self.x_raw.len())?;
        writeln!(f, "yRawIntensity:    {} entries", self.y_raw.len())?;
        writeln!(f, "Genotypes:        {} entries", self.genotypes.len())?;
        writeln!(f, "Scores:           {} entries", self.scores.len())?;
        write!(f, "Base Calls:       {} entries", self.base_calls.len())
    }
}
