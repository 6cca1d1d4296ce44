use std::io::Cursor;

use binrw::BinWrite;
use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use lazy_static::lazy_static;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::gtc::data::*;
use crate::gtc::xform::XForm;
use crate::manifest::strand::{normalize_alleles, Strand};
use crate::manifest::{Manifest, Probe};

pub const STANDARD_MANIFEST: &str = "\
Index,Name,Chromosome,Position,GenTrain Score,SNP,ILMN Strand,Customer Strand,NormID
1,rs1001,1,1000,0.9500,[A/C],TOP,TOP,1
2,rs1002,1,2500,0.8123,[C/A],BOT,TOP,2
3,cnvi0001,2,500,0.7000,[N/A],PLUS,PLUS,1
4,mito1,M,300,0.9100,[T/C],BOT,BOT,3
5,mito2,Mt,100,0.8800,[A/G],TOP,TOP,2
6,rsX,X,4000,0.6000,[G/C],BOT,TOP,1
";

pub const WIDE_MANIFEST: &str = "\
Illumina, Inc.
[Heading]
Descriptor File Name,test.bpm
Assay Format,Infinium LCG
[Assay]
IlmnID,Name,IlmnStrand,SNP,AddressA_ID,Chr,MapInfo,SourceStrand,BeadSetID
rs2001-131_T_F_1,rs2001,TOP,[A/G],1001,1,100,TOP,87
cnvi2003-131_T_F_1,cnvi2003,TOP,[N/A],1003,2,200,TOP,88
rs2002-131_B_R_1,rs2002,BOT,[T/C],1002,Mt,150,BOT,87
[Controls],,,,,,,,
ctrl1,Staining,Red,,,,,,
";

/// Sample-call file contents, serialized with [`GtcFixture::to_bytes`].
#[derive(Debug, Clone)]
pub struct GtcFixture {
    pub version: u8,
    pub probe_count: u32,
    pub sample_name: String,
    pub sample_plate: String,
    pub sample_well: String,
    pub cluster_file: String,
    pub manifest: String,
    pub imaging_date: String,
    pub autocall_date: String,
    pub autocall_version: String,
    pub scanner_name: String,
    pub pmt_green: i32,
    pub pmt_red: i32,
    pub scanner_version: String,
    pub imaging_user: String,
    pub xforms: Vec<XForm>,
    pub x_raw_control: Vec<u16>,
    pub y_raw_control: Vec<u16>,
    pub x_raw: Vec<u16>,
    pub y_raw: Vec<u16>,
    pub genotypes: Vec<u8>,
    pub base_calls: Vec<[u8; 2]>,
    pub scores: Vec<f32>,
    /// Adds a section with an id unknown to the decoder.
    pub unknown_section: bool,
}

fn gtc_string(value: &str) -> Vec<u8> {
    let mut bytes = vec![value.len() as u8];
    bytes.extend_from_slice(value.as_bytes());
    bytes
}

fn gtc_array<T: Copy>(values: &[T], element_size: usize, write: impl Fn(&mut [u8], T)) -> Vec<u8> {
    let mut bytes = vec![0; 4 + values.len() * element_size];
    LittleEndian::write_u32(&mut bytes[..4], values.len() as u32);
    for (chunk, &value) in bytes[4..].chunks_exact_mut(element_size).zip(values) {
        write(chunk, value);
    }
    bytes
}

impl GtcFixture {
    fn sections(&self) -> Vec<(u16, Vec<u8>)> {
        let mut sections = Vec::new();
        if self.unknown_section {
            sections.push((9999, vec![0xDE, 0xAD]));
        }

        for (id, value) in [
            (ID_SAMPLE_NAME, &self.sample_name),
            (ID_SAMPLE_PLATE, &self.sample_plate),
            (ID_SAMPLE_WELL, &self.sample_well),
            (ID_CLUSTER_FILE, &self.cluster_file),
            (ID_MANIFEST, &self.manifest),
            (ID_IMAGING_DATE, &self.imaging_date),
            (ID_AUTOCALL_DATE, &self.autocall_date),
            (ID_AUTOCALL_VERSION, &self.autocall_version),
        ] {
            sections.push((id, gtc_string(value)));
        }

        let mut scanner = gtc_string(&self.scanner_name);
        scanner
            .write_i32::<LittleEndian>(self.pmt_green)
            .expect("writing to a Vec cannot fail");
        scanner
            .write_i32::<LittleEndian>(self.pmt_red)
            .expect("writing to a Vec cannot fail");
        scanner.extend(gtc_string(&self.scanner_version));
        scanner.extend(gtc_string(&self.imaging_user));
        sections.push((ID_SCANNER, scanner));

        let mut xforms = Cursor::new(Vec::new());
        xforms
            .write_u32::<LittleEndian>(self.xforms.len() as u32)
            .expect("writing to a Vec cannot fail");
        for xform in &self.xforms {
            xform
                .write_to(&mut xforms)
                .expect("writing to a Vec cannot fail");
        }
        sections.push((ID_XFORMS, xforms.into_inner()));

        let write_u16 = |buf: &mut [u8], value| LittleEndian::write_u16(buf, value);
        sections.push((ID_X_RAW_CONTROL, gtc_array(&self.x_raw_control, 2, write_u16)));
        sections.push((ID_Y_RAW_CONTROL, gtc_array(&self.y_raw_control, 2, write_u16)));
        sections.push((ID_X_RAW, gtc_array(&self.x_raw, 2, write_u16)));
        sections.push((ID_Y_RAW, gtc_array(&self.y_raw, 2, write_u16)));
        sections.push((
            ID_GENOTYPES,
            gtc_array(&self.genotypes, 1, |buf, value| buf[0] = value),
        ));
        sections.push((
            ID_BASE_CALLS,
            gtc_array(&self.base_calls, 2, |buf, value| buf.copy_from_slice(&value)),
        ));
        sections.push((
            ID_SCORES,
            gtc_array(&self.scores, 4, |buf, value| LittleEndian::write_f32(buf, value)),
        ));

        sections
    }

    /// Serializes the fixture; the scores section is always the last one.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let sections = self.sections();
        let num_entries = sections.len() + 1;
        let mut offset = 3 + 1 + 4 + num_entries * 6;

        let mut entries = vec![GtcTocEntry {
            id: ID_PROBE_COUNT,
            offset: self.probe_count,
        }];
        let mut body = Vec::new();
        for (id, bytes) in sections {
            entries.push(GtcTocEntry {
                id,
                offset: offset as u32,
            });
            offset += bytes.len();
            body.extend(bytes);
        }

        let header = GtcHeader {
            version: self.version,
            num_entries: entries.len() as u32,
            entries,
        };
        let mut cursor = Cursor::new(Vec::new());
        header
            .write_to(&mut cursor)
            .expect("writing to a Vec cannot fail");
        let mut data = cursor.into_inner();
        data.extend(body);
        data
    }
}

/// A single cluster record of an [`EgtFixture`].
#[derive(Debug, Clone)]
pub struct EgtProbeFixture {
    pub name: String,
    pub counts: [i32; 3],
    pub params: [f32; 12],
}

/// Cluster file contents, serialized with [`EgtFixture::to_bytes`].
#[derive(Debug, Clone)]
pub struct EgtFixture {
    pub big_endian: bool,
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
    pub probes: Vec<EgtProbeFixture>,
}

fn egt_string(out: &mut Vec<u8>, value: &str) {
    out.push(value.len() as u8);
    out.extend_from_slice(value.as_bytes());
}

impl EgtFixture {
    fn write_i32(&self, out: &mut Vec<u8>, value: i32) {
        let mut buf = [0; 4];
        if self.big_endian {
            BigEndian::write_i32(&mut buf, value);
        } else {
            LittleEndian::write_i32(&mut buf, value);
        }
        out.extend_from_slice(&buf);
    }

    fn write_f32(&self, out: &mut Vec<u8>, value: f32) {
        let mut buf = [0; 4];
        if self.big_endian {
            BigEndian::write_f32(&mut buf, value);
        } else {
            LittleEndian::write_f32(&mut buf, value);
        }
        out.extend_from_slice(&buf);
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_i32(&mut out, self.file_version);
        for value in [
            &self.gencall_version,
            &self.cluster_version,
            &self.call_version,
            &self.normalization_version,
            &self.date_created,
        ] {
            egt_string(&mut out, value);
        }
        out.push(self.mode);
        egt_string(&mut out, &self.manifest);

        self.write_i32(&mut out, self.data_version);
        egt_string(&mut out, &self.opa);
        self.write_i32(&mut out, self.probes.len() as i32);

        for (i, probe) in self.probes.iter().enumerate() {
            for count in probe.counts {
                self.write_i32(&mut out, count);
            }
            for param in probe.params {
                self.write_f32(&mut out, param);
            }
            // reserved fields must be ignored by the decoder
            for reserved in 0..15 {
                self.write_f32(&mut out, (i * 100 + reserved) as f32);
            }
        }
        out.extend(std::iter::repeat(0xEE).take(self.probes.len() * 13));
        for _ in &self.probes {
            egt_string(&mut out, "0.7312");
        }
        for probe in &self.probes {
            egt_string(&mut out, &probe.name);
        }

        out
    }
}

fn cluster_params(mean_radius: [f32; 3], mean_angle: [f32; 3]) -> [f32; 12] {
    let [r0, r1, r2] = mean_radius;
    let [t0, t1, t2] = mean_angle;
    [
        0.1, 0.1, 0.1, r0, r1, r2, 0.01, 0.01, 0.01, t0, t1, t2,
    ]
}

/// Manifest of `num_probes` probes named `rs1`, `rs2`, ... on chromosome 1.
#[must_use]
pub fn numbered_manifest(num_probes: u32) -> Manifest {
    let probes = (1..=num_probes)
        .map(|i| Probe {
            index: i,
            name: format!("rs{}", i),
            chromosome: "1".to_owned(),
            position: u64::from(i) * 100,
            ..Probe::default()
        })
        .collect();
    Manifest::from_probes(probes)
}

/// Random manifest with BOT/TOP probes spread over `num_groups`
/// normalization groups.
#[must_use]
pub fn random_manifest(num_probes: u32, num_groups: i32, seed: u64) -> Manifest {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let bases = ['A', 'C', 'G', 'T'];
    let probes = (1..=num_probes)
        .map(|i| {
            let strand = if rng.gen_bool(0.5) {
                Strand::Top
            } else {
                Strand::Bot
            };
            let raw = format!(
                "[{}/{}]",
                bases[rng.gen_range(0..4)],
                bases[rng.gen_range(0..4)]
            );
            let (alleles, converted) = normalize_alleles(&raw, strand);
            Probe {
                index: i,
                name: format!("rs{}", i),
                chromosome: rng.gen_range(1..23).to_string(),
                position: rng.gen_range(1..250_000_000),
                score: rng.gen(),
                alleles,
                converted,
                illumina_strand: strand,
                customer_strand: strand,
                norm_id: rng.gen_range(0..num_groups),
                bead_set_id: -1,
            }
        })
        .collect();
    Manifest::from_probes(probes)
}

/// Random sample-call file matching [`random_manifest`] with the same
/// arguments.
#[must_use]
pub fn random_gtc(num_probes: u32, num_groups: i32, seed: u64) -> GtcFixture {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let n = num_probes as usize;
    GtcFixture {
        probe_count: num_probes,
        xforms: (0..num_groups)
            .map(|_| XForm {
                x_offset: rng.gen_range(0.0..50.0),
                y_offset: rng.gen_range(0.0..50.0),
                x_scale: rng.gen_range(1.0..3.0),
                y_scale: rng.gen_range(1.0..3.0),
                shear: rng.gen_range(-0.1..0.1),
                theta: rng.gen_range(-0.1..0.1),
                ..XForm::IDENTITY
            })
            .collect(),
        x_raw: (0..n).map(|_| rng.gen_range(100..20000)).collect(),
        y_raw: (0..n).map(|_| rng.gen_range(100..20000)).collect(),
        genotypes: (0..n).map(|_| rng.gen_range(0..4)).collect(),
        base_calls: vec![*b"--"; n],
        scores: (0..n).map(|_| rng.gen()).collect(),
        ..SIMPLE_GTC.clone()
    }
}

/// Cluster file with identical, well separated clusters for every probe of
/// a manifest.
#[must_use]
pub fn uniform_egt(manifest: &Manifest) -> EgtFixture {
    EgtFixture {
        probes: manifest
            .iter()
            .map(|probe| EgtProbeFixture {
                name: probe.name.clone(),
                counts: [100, 200, 100],
                params: cluster_params([1000.0, 2000.0, 1500.0], [0.1, 0.5, 0.9]),
            })
            .collect(),
        ..SIMPLE_EGT.clone()
    }
}

lazy_static! {
    pub static ref SIMPLE_GTC: GtcFixture = GtcFixture {
        version: 3,
        probe_count: 6,
        sample_name: "sample_1".to_owned(),
        sample_plate: "plate_1".to_owned(),
        sample_well: "A01".to_owned(),
        cluster_file: "test.egt".to_owned(),
        manifest: "test.bpm".to_owned(),
        imaging_date: "Monday, January 06, 2020 10:00:00 AM".to_owned(),
        autocall_date: "1/7/2020 9:30 AM".to_owned(),
        autocall_version: "1.6.2.2".to_owned(),
        scanner_name: "N0001".to_owned(),
        pmt_green: 532,
        pmt_red: 635,
        scanner_version: "2.0.0".to_owned(),
        imaging_user: "operator".to_owned(),
        xforms: vec![
            XForm::IDENTITY,
            XForm {
                x_offset: 10.0,
                y_offset: 20.0,
                x_scale: 2.0,
                y_scale: 2.0,
                ..XForm::IDENTITY
            },
            XForm {
                x_offset: 5.0,
                y_offset: 8.0,
                x_scale: 1.5,
                y_scale: 1.25,
                shear: 0.05,
                theta: 0.1,
                ..XForm::IDENTITY
            },
        ],
        x_raw_control: vec![7, 8],
        y_raw_control: vec![9, 10],
        x_raw: vec![1000, 2000, 300, 5000, 2500, 800],
        y_raw: vec![1000, 100, 3000, 4000, 2500, 50],
        genotypes: vec![2, 1, 3, 2, 0, 1],
        base_calls: vec![*b"AG", *b"GG", *b"AA", *b"CT", *b"--", *b"CC"],
        scores: vec![0.9, 0.8, 0.1, 0.85, 0.0, 0.7],
        unknown_section: false,
    };
    pub static ref SIMPLE_EGT: EgtFixture = EgtFixture {
        big_endian: false,
        file_version: 3,
        gencall_version: "7.0.0".to_owned(),
        cluster_version: "1.0".to_owned(),
        call_version: "GenTrain 2.0".to_owned(),
        normalization_version: "1.1.0".to_owned(),
        date_created: "1/1/2020 12:00 PM".to_owned(),
        mode: 1,
        manifest: "test.bpm".to_owned(),
        data_version: 9,
        opa: "operator".to_owned(),
        probes: vec![EgtProbeFixture {
            name: "P1".to_owned(),
            counts: [10, 20, 10],
            params: cluster_params([800.0, 1200.0, 900.0], [0.03, 0.50, 0.98]),
        }],
    };
    pub static ref CALIBRATION_EGT: EgtFixture = uniform_egt(&Manifest::from_probes(
        ["rs1001", "rs1002", "cnvi0001", "mito1", "mito2", "rsX"]
            .iter()
            .map(|name| Probe {
                name: (*name).to_owned(),
                ..Probe::default()
            })
            .collect(),
    ));
}
