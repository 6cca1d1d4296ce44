use binrw::binrw;

#[binrw]
#[brw(little, magic = b"gtc")]
#[derive(Debug, Clone)]
pub struct GtcHeader {
    pub version: u8,
    pub num_entries: u32,

    #[br(count = num_entries)]
    pub entries: Vec<GtcTocEntry>,
}

/// Table of contents entry: a field id and the byte offset of its section.
/// For the probe count field the offset holds the value itself.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct GtcTocEntry {
    pub id: u16,
    pub offset: u32,
}

/// Size of one encoded [`crate::gtc::xform::XForm`], reserved fields
/// included.
pub const XFORM_RECORD_LEN: usize = 13 * 4;

pub const ID_PROBE_COUNT: u16 = 1;
pub const ID_SAMPLE_NAME: u16 = 10;
pub const ID_SAMPLE_PLATE: u16 = 11;
pub const ID_SAMPLE_WELL: u16 = 12;
pub const ID_CLUSTER_FILE: u16 = 100;
pub const ID_MANIFEST: u16 = 101;
pub const ID_IMAGING_DATE: u16 = 200;
pub const ID_AUTOCALL_DATE: u16 = 201;
pub const ID_AUTOCALL_VERSION: u16 = 300;
pub const ID_XFORMS: u16 = 400;
pub const ID_X_RAW_CONTROL: u16 = 500;
pub const ID_Y_RAW_CONTROL: u16 = 501;
pub const ID_X_RAW: u16 = 1000;
pub const ID_Y_RAW: u16 = 1001;
pub const ID_GENOTYPES: u16 = 1002;
pub const ID_BASE_CALLS: u16 = 1003;
pub const ID_SCORES: u16 = 1004;
pub const ID_SCANNER: u16 = 1005;
