use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use log::{debug, info, trace};

use crate::manifest::strand::{normalize_alleles, Strand};
use crate::manifest::{
    Manifest, ManifestError, ManifestResult, Probe, MITOCHONDRIAL_CHROMOSOME, UNKNOWN_CHROMOSOME,
};

/// Marker column of the wide layout header.
pub const WIDE_HEADER_MARKER: &str = "IlmnID";
/// Start of the trailing control probe section of wide manifests.
pub const CONTROLS_MARKER: &str = "[Controls]";
pub const STANDARD_HEADER: [&str; 9] = [
    "Index",
    "Name",
    "Chromosome",
    "Position",
    "GenTrain Score",
    "SNP",
    "ILMN Strand",
    "Customer Strand",
    "NormID",
];

/// A builder for `ManifestParams`.
#[derive(Debug, Clone)]
pub struct ManifestParamsBuilder {
    wide_format: bool,
    chromosome: Option<String>,
    exclude_cnvs: bool,
}

impl ManifestParamsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            wide_format: false,
            chromosome: None,
            exclude_cnvs: false,
        }
    }

    /// Reads the wide layout, whose header row is located by the `IlmnID`
    /// column, instead of the fixed 9-column layout.
    pub fn wide_format(&mut self, wide_format: bool) -> &mut Self {
        let mut new = self;
        new.wide_format = wide_format;
        new
    }

    /// Keeps only probes on the given chromosome. Mitochondrial probes are
    /// selected with `MT`.
    pub fn chromosome<S: Into<String>>(&mut self, chromosome: Option<S>) -> &mut Self {
        let mut new = self;
        new.chromosome = chromosome.map(Into::into);
        new
    }

    /// Skips probes whose name starts with `cnv`.
    pub fn exclude_cnvs(&mut self, exclude_cnvs: bool) -> &mut Self {
        let mut new = self;
        new.exclude_cnvs = exclude_cnvs;
        new
    }

    pub fn build(&self) -> ManifestParams {
        ManifestParams {
            wide_format: self.wide_format,
            chromosome: self.chromosome.clone(),
            exclude_cnvs: self.exclude_cnvs,
        }
    }
}

impl Default for ManifestParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Manifest reading params.
#[derive(Debug, Clone)]
pub struct ManifestParams {
    wide_format: bool,
    chromosome: Option<String>,
    exclude_cnvs: bool,
}

impl ManifestParams {
    #[must_use]
    pub fn builder() -> ManifestParamsBuilder {
        ManifestParamsBuilder::new()
    }

    #[must_use]
    pub fn is_wide_format(&self) -> bool {
        self.wide_format
    }
}

impl Default for ManifestParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Column positions of one manifest layout.
#[derive(Debug, Clone)]
struct ColumnLayout {
    index: Option<usize>,
    name: usize,
    chromosome: Option<usize>,
    position: usize,
    score: Option<usize>,
    alleles: usize,
    illumina_strand: Option<usize>,
    customer_strand: Option<usize>,
    norm_id: Option<usize>,
    bead_set_id: Option<usize>,
    /// Exact number of fields required on every data line.
    field_count: Option<usize>,
}

impl ColumnLayout {
    fn standard() -> Self {
        Self {
            index: Some(0),
            name: 1,
            chromosome: Some(2),
            position: 3,
            score: Some(4),
            alleles: 5,
            illumina_strand: Some(6),
            customer_strand: Some(7),
            norm_id: Some(8),
            bead_set_id: None,
            field_count: Some(STANDARD_HEADER.len()),
        }
    }

    fn from_wide_header(header: &str, delimiter: u8) -> ManifestResult<Self> {
        let columns: HashMap<&str, usize> = header
            .split(char::from(delimiter))
            .map(str::trim)
            .enumerate()
            .filter(|(_, name)| !name.is_empty())
            .map(|(i, name)| (name, i))
            .collect();
        let required = |name: &'static str| {
            columns
                .get(name)
                .copied()
                .ok_or(ManifestError::MissingColumn(name))
        };
        let optional = |name: &str| columns.get(name).copied();

        Ok(Self {
            index: optional("Index"),
            name: required("Name")?,
            chromosome: optional("Chr"),
            position: required("MapInfo")?,
            score: optional("GenTrain Score"),
            alleles: required("SNP")?,
            illumina_strand: optional("IlmnStrand"),
            customer_strand: optional("SourceStrand"),
            norm_id: optional("NormID"),
            bead_set_id: optional("BeadSetID"),
            field_count: None,
        })
    }
}

fn detect_delimiter(header: &str) -> ManifestResult<u8> {
    if header.contains('\t') {
        Ok(b'\t')
    } else if header.contains(',') {
        Ok(b',')
    } else {
        Err(ManifestError::UnknownDelimiter)
    }
}

/// Reads lines until the header is found. Returns the header and the number
/// of lines consumed.
fn read_header<R: BufRead>(reader: &mut R, wide_format: bool) -> ManifestResult<(String, u64)> {
    let mut line = String::new();
    let mut line_num = 0;
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(ManifestError::MissingHeader);
        }
        line_num += 1;

        let header = line.trim_end_matches(['\r', '\n']).trim_start_matches('\u{feff}');
        if wide_format {
            if header.contains(WIDE_HEADER_MARKER) {
                return Ok((header.to_owned(), line_num));
            }
        } else if header.starts_with(STANDARD_HEADER[0]) {
            return Ok((header.to_owned(), line_num));
        } else {
            return Err(ManifestError::MissingHeader);
        }
    }
}

struct RecordParser<'a> {
    layout: &'a ColumnLayout,
    record: &'a csv::StringRecord,
    line: u64,
}

impl<'a> RecordParser<'a> {
    fn field(&self, column: usize) -> ManifestResult<&'a str> {
        self.record
            .get(column)
            .map(str::trim)
            .ok_or(ManifestError::InvalidLine {
                line: self.line,
                fields: self.record.len(),
            })
    }

    fn optional_field(&self, column: Option<usize>) -> Option<&'a str> {
        column
            .and_then(|column| self.record.get(column))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn number<T: FromStr>(&self, column_name: &'static str, value: &str) -> ManifestResult<T> {
        value.parse().map_err(|_| ManifestError::InvalidNumber {
            line: self.line,
            column: column_name,
            value: value.to_owned(),
        })
    }

    fn optional_number<T: FromStr>(
        &self,
        column_name: &'static str,
        column: Option<usize>,
        default: T,
    ) -> ManifestResult<T> {
        match self.optional_field(column) {
            Some(value) => self.number(column_name, value),
            None => Ok(default),
        }
    }
}

fn canonical_chromosome(chromosome: &str) -> &str {
    match chromosome {
        "M" | "Mt" => MITOCHONDRIAL_CHROMOSOME,
        "" => UNKNOWN_CHROMOSOME,
        other => other,
    }
}

pub(super) fn read_manifest<R: Read>(reader: R, params: &ManifestParams) -> ManifestResult<Manifest> {
    let mut reader = BufReader::new(reader);
    let (header, header_lines) = read_header(&mut reader, params.wide_format)?;
    let delimiter = detect_delimiter(&header)?;
    let layout = if params.wide_format {
        ColumnLayout::from_wide_header(&header, delimiter)?
    } else {
        ColumnLayout::standard()
    };
    debug!(
        "Manifest header found on line {}, delimiter {:?}, layout {:?}",
        header_lines,
        char::from(delimiter),
        layout
    );

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(reader);
    let mut record = csv::StringRecord::new();
    let mut probes = Vec::new();
    let mut next_index = 1;

    while csv_reader.read_record(&mut record)? {
        let line = header_lines + record.position().map_or(0, |pos| pos.line());
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        if params.wide_format && record.iter().any(|field| field.contains(CONTROLS_MARKER)) {
            trace!("Reached the control section on line {}", line);
            break;
        }
        if let Some(count) = layout.field_count {
            if record.len() != count {
                return Err(ManifestError::InvalidLine {
                    line,
                    fields: record.len(),
                });
            }
        }

        let parser = RecordParser {
            layout: &layout,
            record: &record,
            line,
        };
        if let Some(probe) = parse_probe(&parser, params, next_index)? {
            probes.push(probe);
            next_index += 1;
        }
    }

    info!("Read {} probes from the manifest", probes.len());
    Ok(Manifest::from_probes(probes))
}

/// Parses a single data record. Returns `None` for probes rejected by the
/// filters in `params`.
fn parse_probe(
    parser: &RecordParser<'_>,
    params: &ManifestParams,
    next_index: u32,
) -> ManifestResult<Option<Probe>> {
    let layout = parser.layout;

    let name = parser.field(layout.name)?;
    if params.exclude_cnvs && name.starts_with("cnv") {
        return Ok(None);
    }

    let chromosome = canonical_chromosome(
        parser
            .optional_field(layout.chromosome)
            .unwrap_or(UNKNOWN_CHROMOSOME),
    );
    if let Some(selected) = &params.chromosome {
        if selected != chromosome {
            return Ok(None);
        }
    }

    let index = match layout.index {
        Some(column) => {
            let index: u32 = parser.number("Index", parser.field(column)?)?;
            if index == 0 {
                return Err(ManifestError::InvalidNumber {
                    line: parser.line,
                    column: "Index",
                    value: index.to_string(),
                });
            }
            index
        }
        None => next_index,
    };
    let position = parser.number("Position", parser.field(layout.position)?)?;
    let score = parser.optional_number("GenTrain Score", layout.score, -1.0)?;
    let illumina_strand = parser
        .optional_field(layout.illumina_strand)
        .map_or(Strand::Unknown, Strand::from_field);
    let customer_strand = parser
        .optional_field(layout.customer_strand)
        .map_or(Strand::Unknown, Strand::from_field);
    let norm_id = parser.optional_number("NormID", layout.norm_id, -1)?;
    let bead_set_id = parser.optional_number("BeadSetID", layout.bead_set_id, -1)?;
    let (alleles, converted) = normalize_alleles(parser.field(layout.alleles)?, illumina_strand);

    Ok(Some(Probe {
        index,
        name: name.to_owned(),
        chromosome: chromosome.to_owned(),
        position,
        score,
        alleles,
        converted,
        illumina_strand,
        customer_strand,
        norm_id,
        bead_set_id,
    }))
}

impl Manifest {
    /// Opens and parses a manifest file.
    pub fn open<P: AsRef<Path>>(path: P, params: &ManifestParams) -> ManifestResult<Self> {
        let path = path.as_ref();
        debug!("Opening manifest {}", path.display());
        let file = File::open(path)?;
        let mut manifest = read_manifest(file, params)?;
        manifest.set_path(path);
        Ok(manifest)
    }

    /// Parses a manifest from a stream.
    ///
    /// # Examples
    /// ```
    /// use simtools::manifest::reader::ManifestParams;
    /// use simtools::manifest::Manifest;
    ///
    /// let data = "Index,Name,Chromosome,Position,GenTrain Score,SNP,ILMN Strand,Customer Strand,NormID\n\
    ///             1,rs1,1,100,0.9,[T/C],BOT,TOP,3\n";
    /// let manifest = Manifest::read(data.as_bytes(), &ManifestParams::default()).unwrap();
    ///
    /// assert_eq!(manifest.find_probe_by_name("rs1").unwrap().alleles.to_string(), "AG");
    /// ```
    pub fn read<R: Read>(reader: R, params: &ManifestParams) -> ManifestResult<Self> {
        read_manifest(reader, params)
    }
}

#[cfg(test)]
mod tests {
    use crate::_internal_test_data::{STANDARD_MANIFEST, WIDE_MANIFEST};
    use crate::manifest::reader::ManifestParams;
    use crate::manifest::strand::{AllelePair, Strand};
    use crate::manifest::{Manifest, ManifestError};

    fn read_standard(params: &ManifestParams) -> Manifest {
        Manifest::read(STANDARD_MANIFEST.as_bytes(), params).unwrap()
    }

    #[test_log::test]
    fn test_standard_layout() {
        let manifest = read_standard(&ManifestParams::default());

        assert_eq!(manifest.len(), 6);
        let probe = manifest.find_probe_by_name("rs1002").unwrap();
        assert_eq!(probe.index, 2);
        assert_eq!(probe.chromosome, "1");
        assert_eq!(probe.position, 2500);
        assert_eq!(probe.alleles, AllelePair(*b"GT"));
        assert!(probe.converted);
        assert_eq!(probe.illumina_strand, Strand::Bot);
        assert_eq!(probe.customer_strand, Strand::Top);
        assert_eq!(probe.norm_id, 2);
        assert_eq!(probe.bead_set_id, -1);
        assert!((probe.score - 0.8123).abs() < 1e-6);
    }

    #[test]
    fn test_mitochondrial_label() {
        let manifest = read_standard(&ManifestParams::default());

        assert_eq!(manifest.chromosome_of("mito1"), Some("MT"));
        assert_eq!(manifest.chromosome_of("mito2"), Some("MT"));
    }

    #[test]
    fn test_chromosome_filter() {
        let params = ManifestParams::builder().chromosome(Some("MT")).build();
        let manifest = read_standard(&params);

        let names: Vec<_> = manifest.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["mito1", "mito2"]);
    }

    #[test]
    fn test_exclude_cnvs() {
        let all = read_standard(&ManifestParams::default());
        assert!(all.find_probe_by_name("cnvi0001").is_some());

        let params = ManifestParams::builder().exclude_cnvs(true).build();
        let manifest = read_standard(&params);
        assert_eq!(manifest.len(), 5);
        assert!(manifest.find_probe_by_name("cnvi0001").is_none());
    }

    #[test]
    fn test_tab_delimited() {
        let data = STANDARD_MANIFEST.replace(',', "\t");
        let manifest = Manifest::read(data.as_bytes(), &ManifestParams::default()).unwrap();

        assert_eq!(manifest.len(), 6);
        assert_eq!(
            manifest.find_probe_by_name("rs1001").unwrap().alleles,
            AllelePair(*b"AC")
        );
    }

    #[test]
    fn test_wide_layout() {
        let params = ManifestParams::builder().wide_format(true).build();
        let manifest = Manifest::read(WIDE_MANIFEST.as_bytes(), &params).unwrap();

        assert_eq!(manifest.len(), 3);
        let indices: Vec<_> = manifest.iter().map(|p| p.index).collect();
        assert_eq!(indices, [1, 2, 3]);

        let probe = manifest.find_probe_by_name("rs2002").unwrap();
        assert_eq!(probe.chromosome, "MT");
        assert_eq!(probe.position, 150);
        assert_eq!(probe.score, -1.0);
        assert_eq!(probe.norm_id, -1);
        assert_eq!(probe.bead_set_id, 87);
        assert_eq!(probe.alleles, AllelePair(*b"AG"));
        assert!(probe.converted);
        assert!(manifest.find_probe_by_name("ctrl1").is_none());
    }

    #[test]
    fn test_wide_index_counter_skips_filtered_probes() {
        let params = ManifestParams::builder()
            .wide_format(true)
            .exclude_cnvs(true)
            .build();
        let manifest = Manifest::read(WIDE_MANIFEST.as_bytes(), &params).unwrap();

        let indices: Vec<_> = manifest
            .iter()
            .map(|p| (p.name.as_str(), p.index))
            .collect();
        assert_eq!(indices, [("rs2001", 1), ("rs2002", 2)]);
    }

    #[test]
    fn test_wide_missing_required_column() {
        let data = "IlmnID,Name,Chr,MapInfo\nrs1_T,rs1,1,100\n";
        let params = ManifestParams::builder().wide_format(true).build();

        assert!(matches!(
            Manifest::read(data.as_bytes(), &params),
            Err(ManifestError::MissingColumn("SNP"))
        ));
    }

    #[test]
    fn test_wide_missing_header() {
        let params = ManifestParams::builder().wide_format(true).build();

        assert!(matches!(
            Manifest::read("Index,Name\n".as_bytes(), &params),
            Err(ManifestError::MissingHeader)
        ));
    }

    #[test]
    fn test_invalid_standard_header() {
        assert!(matches!(
            Manifest::read("Name,Index\n".as_bytes(), &ManifestParams::default()),
            Err(ManifestError::MissingHeader)
        ));
        assert!(matches!(
            Manifest::read("Index\n".as_bytes(), &ManifestParams::default()),
            Err(ManifestError::UnknownDelimiter)
        ));
    }

    #[test]
    fn test_wrong_field_count() {
        let data = "Index,Name,Chromosome,Position,GenTrain Score,SNP,ILMN Strand,Customer Strand,NormID\n\
                    1,rs1,1,100,0.9,[A/C],TOP,TOP\n";

        assert!(matches!(
            Manifest::read(data.as_bytes(), &ManifestParams::default()),
            Err(ManifestError::InvalidLine { line: 2, fields: 8 })
        ));
    }

    #[test]
    fn test_invalid_position() {
        let data = "Index,Name,Chromosome,Position,GenTrain Score,SNP,ILMN Strand,Customer Strand,NormID\n\
                    1,rs1,1,abc,0.9,[A/C],TOP,TOP,1\n";

        assert!(matches!(
            Manifest::read(data.as_bytes(), &ManifestParams::default()),
            Err(ManifestError::InvalidNumber {
                column: "Position",
                ..
            })
        ));
    }
}
