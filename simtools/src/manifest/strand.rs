use std::fmt::{Display, Formatter};

use serde::Serialize;

/// Marker used for bases that cannot be determined.
pub const UNKNOWN_BASE: u8 = b'?';

/// Strand designation of a probe, as given by its one-letter code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
pub enum Strand {
    Top,
    Bot,
    Minus,
    Plus,
    Unknown,
}

impl Strand {
    /// Parses the strand from the first character of a manifest field, so
    /// both `T` and `TOP` are accepted.
    #[must_use]
    pub fn from_field(field: &str) -> Self {
        match field.trim().chars().next() {
            Some('T') => Strand::Top,
            Some('B') => Strand::Bot,
            Some('M') => Strand::Minus,
            Some('P') => Strand::Plus,
            _ => Strand::Unknown,
        }
    }

    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Strand::Top => 'T',
            Strand::Bot => 'B',
            Strand::Minus => 'M',
            Strand::Plus => 'P',
            Strand::Unknown => '?',
        }
    }

    #[must_use]
    pub const fn long_name(self) -> &'static str {
        match self {
            Strand::Top => "TOP",
            Strand::Bot => "BOT",
            Strand::Minus => "MINUS",
            Strand::Plus => "PLUS",
            Strand::Unknown => "UNKNOWN",
        }
    }
}

impl Default for Strand {
    fn default() -> Self {
        Strand::Unknown
    }
}

impl Display for Strand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.long_name())
    }
}

/// Allele A and allele B of a probe, in TOP strand orientation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
pub struct AllelePair(pub [u8; 2]);

impl AllelePair {
    pub const UNKNOWN: AllelePair = AllelePair([UNKNOWN_BASE, UNKNOWN_BASE]);
    pub const NO_CALL: AllelePair = AllelePair(*b"--");

    #[must_use]
    pub fn a(self) -> char {
        char::from(self.0[0])
    }

    #[must_use]
    pub fn b(self) -> char {
        char::from(self.0[1])
    }

    /// Manifest notation of the pair, e.g. `[A/C]`.
    #[must_use]
    pub fn to_bracketed(self) -> String {
        format!("[{}/{}]", self.a(), self.b())
    }
}

impl Default for AllelePair {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl Display for AllelePair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.a(), self.b())
    }
}

fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        _ => UNKNOWN_BASE,
    }
}

/// Canonicalizes an `[X/Y]` allele string to TOP strand orientation.
///
/// Returns the pair and whether it was converted from BOT. TOP, MINUS and
/// PLUS pairs are copied as-is, BOT pairs are complemented base by base and
/// any other strand yields an unknown pair.
///
/// # Examples
/// ```
/// use simtools::manifest::strand::{normalize_alleles, AllelePair, Strand};
///
/// assert_eq!(
///     normalize_alleles("[C/A]", Strand::Bot),
///     (AllelePair(*b"GT"), true)
/// );
/// assert_eq!(
///     normalize_alleles("[D/I]", Strand::Plus),
///     (AllelePair(*b"DI"), false)
/// );
/// ```
#[must_use]
pub fn normalize_alleles(alleles: &str, strand: Strand) -> (AllelePair, bool) {
    let bytes = alleles.as_bytes();
    let first = bytes.get(1).copied().unwrap_or(UNKNOWN_BASE);
    let second = bytes.get(3).copied().unwrap_or(UNKNOWN_BASE);

    match strand {
        Strand::Top | Strand::Minus | Strand::Plus => (AllelePair([first, second]), false),
        Strand::Bot => (AllelePair([complement(first), complement(second)]), true),
        Strand::Unknown => (AllelePair::UNKNOWN, false),
    }
}
