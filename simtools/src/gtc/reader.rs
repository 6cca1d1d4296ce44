use std::io::Cursor;

use binrw::BinRead;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use log::{debug, trace, warn};

use crate::gtc::data::*;
use crate::gtc::xform::XForm;
use crate::gtc::{BaseCall, GtcError, GtcFile, GtcResult, GtcSections, ScannerInfo};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum TextField {
    SampleName,
    SamplePlate,
    SampleWell,
    ClusterFile,
    Manifest,
    ImagingDate,
    AutocallDate,
    AutocallVersion,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ArrayField {
    XRawControl,
    YRawControl,
    XRaw,
    YRaw,
    Genotypes,
    BaseCalls,
    Scores,
}

impl ArrayField {
    fn section(self) -> GtcSections {
        match self {
            ArrayField::XRawControl | ArrayField::YRawControl => GtcSections::CONTROL,
            ArrayField::XRaw | ArrayField::YRaw => GtcSections::INTENSITY,
            ArrayField::Genotypes => GtcSections::GENOTYPES,
            ArrayField::BaseCalls => GtcSections::BASECALLS,
            ArrayField::Scores => GtcSections::SCORES,
        }
    }
}

/// A decoded table of contents entry.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum GtcEntry {
    ProbeCount(u32),
    Text(TextField, u32),
    XForms(u32),
    Array(ArrayField, u32),
    Scanner(u32),
    Unknown(u16),
}

impl From<GtcTocEntry> for GtcEntry {
    fn from(entry: GtcTocEntry) -> Self {
        let offset = entry.offset;
        match entry.id {
            ID_PROBE_COUNT => GtcEntry::ProbeCount(offset),
            ID_SAMPLE_NAME => GtcEntry::Text(TextField::SampleName, offset),
            ID_SAMPLE_PLATE => GtcEntry::Text(TextField::SamplePlate, offset),
            ID_SAMPLE_WELL => GtcEntry::Text(TextField::SampleWell, offset),
            ID_CLUSTER_FILE => GtcEntry::Text(TextField::ClusterFile, offset),
            ID_MANIFEST => GtcEntry::Text(TextField::Manifest, offset),
            ID_IMAGING_DATE => GtcEntry::Text(TextField::ImagingDate, offset),
            ID_AUTOCALL_DATE => GtcEntry::Text(TextField::AutocallDate, offset),
            ID_AUTOCALL_VERSION => GtcEntry::Text(TextField::AutocallVersion, offset),
            ID_XFORMS => GtcEntry::XForms(offset),
            ID_X_RAW_CONTROL => GtcEntry::Array(ArrayField::XRawControl, offset),
            ID_Y_RAW_CONTROL => GtcEntry::Array(ArrayField::YRawControl, offset),
            ID_X_RAW => GtcEntry::Array(ArrayField::XRaw, offset),
            ID_Y_RAW => GtcEntry::Array(ArrayField::YRaw, offset),
            ID_GENOTYPES => GtcEntry::Array(ArrayField::Genotypes, offset),
            ID_BASE_CALLS => GtcEntry::Array(ArrayField::BaseCalls, offset),
            ID_SCORES => GtcEntry::Array(ArrayField::Scores, offset),
            ID_SCANNER => GtcEntry::Scanner(offset),
            id => GtcEntry::Unknown(id),
        }
    }
}

/// Decodes an in-memory GTC file.
pub(super) struct GtcDecoder<'a> {
    data: &'a [u8],
    sections: GtcSections,
}

impl<'a> GtcDecoder<'a> {
    pub fn new(data: &'a [u8], sections: GtcSections) -> Self {
        Self { data, sections }
    }

    pub fn decode(&self) -> GtcResult<GtcFile> {
        let header = GtcHeader::read(&mut Cursor::new(self.data))?;
        debug!(
            "GTC header: version {}, {} entries, sections {:?}",
            header.version, header.num_entries, self.sections
        );

        let mut gtc = GtcFile {
            version: header.version,
            ..GtcFile::default()
        };
        for toc_entry in &header.entries {
            let entry = GtcEntry::from(*toc_entry);
            trace!("GTC entry {:?}", entry);
            self.decode_entry(entry, toc_entry.id, &mut gtc)?;
        }

        Ok(gtc)
    }

    fn decode_entry(&self, entry: GtcEntry, id: u16, gtc: &mut GtcFile) -> GtcResult<()> {
        match entry {
            GtcEntry::ProbeCount(count) => gtc.metadata.probe_count = count,
            GtcEntry::Text(field, offset) => {
                let value = self.read_string(&mut self.section(id, offset)?)?;
                let metadata = &mut gtc.metadata;
                match field {
                    TextField::SampleName => metadata.sample_name = value,
                    TextField::SamplePlate => metadata.sample_plate = value,
                    TextField::SampleWell => metadata.sample_well = value,
                    TextField::ClusterFile => metadata.cluster_file = value,
                    TextField::Manifest => metadata.manifest = value,
                    TextField::ImagingDate => metadata.imaging_date = value,
                    TextField::AutocallDate => metadata.autocall_date = value,
                    TextField::AutocallVersion => metadata.autocall_version = value,
                }
            }
            GtcEntry::XForms(offset) => {
                if self.sections.contains(GtcSections::XFORM) {
                    gtc.xforms = self.read_xforms(id, offset)?;
                }
            }
            GtcEntry::Array(field, offset) => {
                if self.sections.contains(field.section()) {
                    self.read_array_field(field, id, offset, gtc)?;
                }
            }
            GtcEntry::Scanner(offset) => {
                gtc.metadata.scanner = self.read_scanner(id, offset)?;
            }
            GtcEntry::Unknown(id) => warn!("Skipping unknown GTC section id {}", id),
        }

        Ok(())
    }

    fn read_array_field(
        &self,
        field: ArrayField,
        id: u16,
        offset: u32,
        gtc: &mut GtcFile,
    ) -> GtcResult<()> {
        match field {
            ArrayField::XRawControl => gtc.x_raw_control = self.read_u16_array(id, offset)?,
            ArrayField::YRawControl => gtc.y_raw_control = self.read_u16_array(id, offset)?,
            ArrayField::XRaw => gtc.x_raw = self.read_u16_array(id, offset)?,
            ArrayField::YRaw => gtc.y_raw = self.read_u16_array(id, offset)?,
            ArrayField::Genotypes => {
                gtc.genotypes = self.read_array(id, offset, 1, |bytes| bytes[0])?;
            }
            ArrayField::BaseCalls => {
                gtc.base_calls =
                    self.read_array(id, offset, 2, |bytes| BaseCall([bytes[0], bytes[1]]))?;
            }
            ArrayField::Scores => {
                gtc.scores = self.read_array(id, offset, 4, LittleEndian::read_f32)?;
            }
        }

        Ok(())
    }

    fn section(&self, id: u16, offset: u32) -> GtcResult<Cursor<&'a [u8]>> {
        if offset as usize >= self.data.len() {
            return Err(GtcError::SectionOutOfBounds {
                id,
                offset,
                file_len: self.data.len(),
            });
        }

        let mut cursor = Cursor::new(self.data);
        cursor.set_position(u64::from(offset));
        Ok(cursor)
    }

    fn read_string(&self, cursor: &mut Cursor<&'a [u8]>) -> GtcResult<String> {
        let length = usize::from(cursor.read_u8()?);
        let start = cursor.position() as usize;
        let bytes = self
            .data
            .get(start..start + length)
            .ok_or(GtcError::Truncated)?;
        cursor.set_position((start + length) as u64);

        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Returns the payload of a count-prefixed array section after checking
    /// that all `count * element_size` bytes are present.
    fn array_payload(&self, id: u16, offset: u32, element_size: usize) -> GtcResult<&'a [u8]> {
        let mut cursor = self.section(id, offset)?;
        let count = cursor.read_u32::<LittleEndian>()? as usize;
        let start = cursor.position() as usize;

        count
            .checked_mul(element_size)
            .and_then(|len| len.checked_add(start))
            .and_then(|end| self.data.get(start..end))
            .ok_or(GtcError::SectionOutOfBounds {
                id,
                offset,
                file_len: self.data.len(),
            })
    }

    fn read_array<T>(
        &self,
        id: u16,
        offset: u32,
        element_size: usize,
        decode: impl Fn(&[u8]) -> T,
    ) -> GtcResult<Vec<T>> {
        let payload = self.array_payload(id, offset, element_size)?;
        let values: Vec<T> = payload.chunks_exact(element_size).map(decode).collect();
        trace!("Read {} elements of GTC section {}", values.len(), id);
        Ok(values)
    }

    fn read_u16_array(&self, id: u16, offset: u32) -> GtcResult<Vec<u16>> {
        self.read_array(id, offset, 2, LittleEndian::read_u16)
    }

    fn read_xforms(&self, id: u16, offset: u32) -> GtcResult<Vec<XForm>> {
        let payload = self.array_payload(id, offset, XFORM_RECORD_LEN)?;
        let count = payload.len() / XFORM_RECORD_LEN;

        let mut cursor = Cursor::new(payload);
        let mut xforms = Vec::with_capacity(count);
        for _ in 0..count {
            xforms.push(XForm::read(&mut cursor)?);
        }
        debug!("Read {} normalization transforms", xforms.len());
        Ok(xforms)
    }

    fn read_scanner(&self, id: u16, offset: u32) -> GtcResult<ScannerInfo> {
        let mut cursor = self.section(id, offset)?;
        let name = self.read_string(&mut cursor)?;
        let pmt_green = cursor.read_i32::<LittleEndian>()?;
        let pmt_red = cursor.read_i32::<LittleEndian>()?;
        let version = self.read_string(&mut cursor)?;
        let imaging_user = self.read_string(&mut cursor)?;

        Ok(ScannerInfo {
            name,
            pmt_green,
            pmt_red,
            version,
            imaging_user,
        })
    }
}
