use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

use crate::manifest::reader::STANDARD_HEADER;
use crate::manifest::{Manifest, ManifestResult, Probe};

fn probe_record(probe: &Probe) -> [String; 9] {
    [
        probe.index.to_string(),
        probe.name.clone(),
        probe.chromosome.clone(),
        probe.position.to_string(),
        format!("{:.6}", probe.score),
        probe.alleles.to_bracketed(),
        probe.normalized_strand().long_name().to_owned(),
        probe.normalized_customer_strand().long_name().to_owned(),
        probe.norm_id.to_string(),
    ]
}

impl Manifest {
    /// Writes the canonical comma-delimited table, readable with the
    /// standard layout, in the current probe order.
    pub fn write_to<W: Write>(&self, writer: W) -> ManifestResult<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(b',')
            .from_writer(writer);

        csv_writer.write_record(STANDARD_HEADER)?;
        for probe in self {
            csv_writer.write_record(&probe_record(probe))?;
        }
        csv_writer.flush()?;

        info!("Wrote {} probes", self.len());
        Ok(())
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> ManifestResult<()> {
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))
    }
}

#[cfg(test)]
mod tests {
    use crate::_internal_test_data::{STANDARD_MANIFEST, WIDE_MANIFEST};
    use crate::manifest::reader::ManifestParams;
    use crate::manifest::Manifest;

    fn round_trip(manifest: &Manifest) -> Manifest {
        let mut data = Vec::new();
        manifest.write_to(&mut data).unwrap();
        Manifest::read(data.as_slice(), &ManifestParams::default()).unwrap()
    }

    fn assert_same_probes(original: &Manifest, reread: &Manifest) {
        assert_eq!(original.len(), reread.len());
        for (a, b) in original.iter().zip(reread.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.index, b.index);
            assert_eq!(a.alleles, b.alleles, "{}", a.name);
            assert_eq!(a.position, b.position);
            assert_eq!(a.normalized_strand(), b.normalized_strand(), "{}", a.name);
            assert_eq!(a.chromosome, b.chromosome);
            assert_eq!(a.norm_id, b.norm_id);
        }
    }

    #[test]
    fn test_round_trip_standard() {
        let manifest = Manifest::read(STANDARD_MANIFEST.as_bytes(), &ManifestParams::default())
            .unwrap();

        assert_same_probes(&manifest, &round_trip(&manifest));
    }

    #[test]
    fn test_round_trip_wide() {
        let params = ManifestParams::builder().wide_format(true).build();
        let manifest = Manifest::read(WIDE_MANIFEST.as_bytes(), &params).unwrap();

        assert_same_probes(&manifest, &round_trip(&manifest));
    }

    #[test]
    fn test_written_lines() {
        let manifest = Manifest::read(STANDARD_MANIFEST.as_bytes(), &ManifestParams::default())
            .unwrap();
        let mut data = Vec::new();
        manifest.write_to(&mut data).unwrap();
        let text = String::from_utf8(data).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(
            lines[0],
            "Index,Name,Chromosome,Position,GenTrain Score,SNP,ILMN Strand,Customer Strand,NormID"
        );
        assert_eq!(lines[2], "2,rs1002,1,2500,0.812300,[G/T],TOP,TOP,2");
        assert_eq!(lines.len(), manifest.len() + 1);
    }

    #[test]
    fn test_converted_customer_strand_written_as_top() {
        let data = "Index,Name,Chromosome,Position,GenTrain Score,SNP,ILMN Strand,Customer Strand,NormID\n\
                    1,rs1,1,100,0.9,[C/A],BOT,BOT,1\n";
        let manifest = Manifest::read(data.as_bytes(), &ManifestParams::default()).unwrap();
        let mut written = Vec::new();
        manifest.write_to(&mut written).unwrap();
        let text = String::from_utf8(written).unwrap();

        assert_eq!(text.lines().nth(1), Some("1,rs1,1,100,0.900000,[G/T],TOP,TOP,1"));
    }
}
