//! Probe manifests: parsing, TOP strand allele normalization, lookups and
//! ordering.

use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use log::{debug, warn};
use serde::Serialize;

use crate::manifest::strand::{AllelePair, Strand};

pub mod reader;
pub mod strand;
pub mod writer;

pub const MITOCHONDRIAL_CHROMOSOME: &str = "MT";
pub const UNKNOWN_CHROMOSOME: &str = "??";

#[derive(Debug)]
pub enum ManifestError {
    IoError(std::io::Error),
    CsvError(csv::Error),
    /// No header line could be found.
    MissingHeader,
    /// Neither a tab nor a comma appears in the header line.
    UnknownDelimiter,
    MissingColumn(&'static str),
    /// A data line does not have the number of fields the layout requires.
    InvalidLine { line: u64, fields: usize },
    InvalidNumber {
        line: u64,
        column: &'static str,
        value: String,
    },
}

impl From<std::io::Error> for ManifestError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

impl From<csv::Error> for ManifestError {
    fn from(e: csv::Error) -> Self {
        Self::CsvError(e)
    }
}

impl Display for ManifestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestError::IoError(e) => write!(f, "IO error: {}", e),
            ManifestError::CsvError(e) => write!(f, "CSV error: {}", e),
            ManifestError::MissingHeader => write!(f, "Manifest header not found"),
            ManifestError::UnknownDelimiter => {
                write!(f, "Cannot determine the manifest delimiter")
            }
            ManifestError::MissingColumn(column) => {
                write!(f, "Required manifest column `{}` is missing", column)
            }
            ManifestError::InvalidLine { line, fields } => {
                write!(f, "Invalid manifest line {}: {} fields", line, fields)
            }
            ManifestError::InvalidNumber {
                line,
                column,
                value,
            } => write!(
                f,
                "Invalid value `{}` in column `{}` on manifest line {}",
                value, column, line
            ),
        }
    }
}

impl Error for ManifestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ManifestError::IoError(e) => Some(e),
            ManifestError::CsvError(e) => Some(e),
            _ => None,
        }
    }
}

pub type ManifestResult<T> = Result<T, ManifestError>;

/// A single manifest entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Probe {
    /// 1-based index of the probe in the per-probe arrays of sample files.
    pub index: u32,
    pub name: String,
    pub chromosome: String,
    pub position: u64,
    /// GenTrain score, -1 if absent.
    pub score: f32,
    pub alleles: AllelePair,
    /// Whether `alleles` was converted from the BOT strand.
    pub converted: bool,
    pub illumina_strand: Strand,
    pub customer_strand: Strand,
    /// Normalization group id, -1 if absent.
    pub norm_id: i32,
    /// Bead set id, -1 if absent.
    pub bead_set_id: i32,
}

impl Probe {
    /// Position of this probe in sample file arrays, `None` for the invalid
    /// index 0.
    #[must_use]
    pub fn array_index(&self) -> Option<usize> {
        (self.index as usize).checked_sub(1)
    }

    /// Strand the alleles are expressed in: TOP for converted BOT probes,
    /// the Illumina strand otherwise.
    #[must_use]
    pub fn normalized_strand(&self) -> Strand {
        if self.converted {
            Strand::Top
        } else {
            self.illumina_strand
        }
    }

    /// Customer strand after conversion: BOT is reported as TOP once the
    /// alleles were converted.
    #[must_use]
    pub fn normalized_customer_strand(&self) -> Strand {
        if self.converted && self.customer_strand == Strand::Bot {
            Strand::Top
        } else {
            self.customer_strand
        }
    }
}

impl Default for Probe {
    fn default() -> Self {
        Self {
            index: 1,
            name: String::new(),
            chromosome: UNKNOWN_CHROMOSOME.to_owned(),
            position: 0,
            score: -1.0,
            alleles: AllelePair::UNKNOWN,
            converted: false,
            illumina_strand: Strand::Unknown,
            customer_strand: Strand::Unknown,
            norm_id: -1,
            bead_set_id: -1,
        }
    }
}

/// Ordered collection of probes with a name lookup and the mapping from
/// normalization group ids to transform table positions.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    path: Option<PathBuf>,
    probes: Vec<Probe>,
    name_index: HashMap<String, usize>,
    norm_groups: IndexSet<i32>,
}

impl Manifest {
    /// Builds a manifest from already parsed probes. Normalization groups
    /// are numbered in order of first appearance.
    #[must_use]
    pub fn from_probes(probes: Vec<Probe>) -> Self {
        let norm_groups = probes.iter().map(|probe| probe.norm_id).collect();
        let mut manifest = Self {
            path: None,
            probes,
            name_index: HashMap::new(),
            norm_groups,
        };
        manifest.rebuild_name_index();
        manifest
    }

    pub(crate) fn set_path(&mut self, path: &Path) {
        self.path = Some(path.to_owned());
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    #[must_use]
    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Probe> + '_ {
        self.probes.iter()
    }

    #[must_use]
    pub fn find_probe_by_name(&self, name: &str) -> Option<&Probe> {
        self.name_index.get(name).map(|&i| &self.probes[i])
    }

    #[must_use]
    pub fn chromosome_of(&self, name: &str) -> Option<&str> {
        self.find_probe_by_name(name)
            .map(|probe| probe.chromosome.as_str())
    }

    /// Position of the normalization group in the transform table of a
    /// sample file.
    #[must_use]
    pub fn normalization_index(&self, norm_id: i32) -> Option<usize> {
        self.norm_groups.get_index_of(&norm_id)
    }

    /// Normalization group ids, in transform table order.
    pub fn normalization_groups(&self) -> impl Iterator<Item = i32> + '_ {
        self.norm_groups.iter().copied()
    }

    /// Stable sort by position only; probes sharing a position keep their
    /// relative order.
    pub fn order_by_position(&mut self) {
        self.probes.sort_by_key(|probe| probe.position);
        self.rebuild_name_index();
    }

    /// Stable sort by chromosome label, then position, then name.
    pub fn order_by_locus(&mut self) {
        self.probes.sort_by(|a, b| {
            a.chromosome
                .cmp(&b.chromosome)
                .then(a.position.cmp(&b.position))
                .then_with(|| a.name.cmp(&b.name))
        });
        self.rebuild_name_index();
    }

    fn rebuild_name_index(&mut self) {
        self.name_index.clear();
        self.name_index.reserve(self.probes.len());
        for (i, probe) in self.probes.iter().enumerate() {
            if let Some(previous) = self.name_index.insert(probe.name.clone(), i) {
                warn!(
                    "Duplicate probe name {} (entries {} and {}), using the latter",
                    probe.name, previous, i
                );
            }
        }
        debug!("Indexed {} probe names", self.name_index.len());
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a Probe;
    type IntoIter = std::slice::Iter<'a, Probe>;

    fn into_iter(self) -> Self::IntoIter {
        self.probes.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::manifest::{Manifest, Probe};

    fn probe(name: &str, chromosome: &str, position: u64, norm_id: i32) -> Probe {
        Probe {
            name: name.to_owned(),
            chromosome: chromosome.to_owned(),
            position,
            norm_id,
            ..Probe::default()
        }
    }

    fn names(manifest: &Manifest) -> Vec<&str> {
        manifest.iter().map(|probe| probe.name.as_str()).collect()
    }

    #[test]
    fn test_normalization_groups_in_first_appearance_order() {
        let manifest = Manifest::from_probes(vec![
            probe("a", "1", 1, 7),
            probe("b", "1", 2, 3),
            probe("c", "1", 3, 7),
            probe("d", "1", 4, 12),
        ]);

        assert_eq!(manifest.normalization_index(7), Some(0));
        assert_eq!(manifest.normalization_index(3), Some(1));
        assert_eq!(manifest.normalization_index(12), Some(2));
        assert_eq!(manifest.normalization_index(5), None);
        assert_eq!(manifest.normalization_groups().collect::<Vec<_>>(), [7, 3, 12]);
    }

    #[test]
    fn test_order_by_position_keeps_duplicates() {
        let mut manifest = Manifest::from_probes(vec![
            probe("c", "2", 30, 0),
            probe("a", "1", 10, 0),
            probe("b", "X", 10, 0),
            probe("d", "1", 5, 0),
        ]);
        manifest.order_by_position();

        assert_eq!(names(&manifest), ["d", "a", "b", "c"]);
        assert_eq!(manifest.find_probe_by_name("c").unwrap().position, 30);
    }

    #[test]
    fn test_order_by_locus() {
        let mut manifest = Manifest::from_probes(vec![
            probe("z", "2", 10, 0),
            probe("y", "10", 10, 0),
            probe("b", "1", 10, 0),
            probe("a", "1", 10, 0),
            probe("c", "1", 5, 0),
        ]);
        manifest.order_by_locus();

        assert_eq!(names(&manifest), ["c", "a", "b", "y", "z"]);
        assert_eq!(manifest.chromosome_of("y"), Some("10"));
        assert_eq!(manifest.chromosome_of("missing"), None);
    }

    #[test]
    fn test_array_index_and_normalized_strand() {
        let mut bot = Probe {
            index: 5,
            illumina_strand: crate::manifest::strand::Strand::Bot,
            converted: true,
            ..Probe::default()
        };
        assert_eq!(bot.array_index(), Some(4));
        assert_eq!(
            bot.normalized_strand(),
            crate::manifest::strand::Strand::Top
        );

        bot.converted = false;
        assert_eq!(
            bot.normalized_strand(),
            crate::manifest::strand::Strand::Bot
        );
    }

    #[test]
    fn test_zero_index_has_no_array_position() {
        let probe = Probe {
            index: 0,
            ..Probe::default()
        };

        assert_eq!(probe.array_index(), None);
    }

    #[test]
    fn test_normalized_customer_strand() {
        use crate::manifest::strand::Strand;

        let mut probe = Probe {
            illumina_strand: Strand::Bot,
            customer_strand: Strand::Bot,
            converted: true,
            ..Probe::default()
        };
        assert_eq!(probe.normalized_customer_strand(), Strand::Top);

        probe.customer_strand = Strand::Minus;
        assert_eq!(probe.normalized_customer_strand(), Strand::Minus);

        probe.customer_strand = Strand::Bot;
        probe.converted = false;
        assert_eq!(probe.normalized_customer_strand(), Strand::Bot);
    }
}
