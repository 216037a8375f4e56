use anyhow::Result;
use std::path::Path;

use crate::parsers::{build_record, read_markers, MarkerSet, ParseErrorKind, ParseOptions};
use crate::types::{MarkerRecord, SourceFormat};

/// AncestryDNA raw-data parser: tab-separated
/// `rsid	chromosome	position	allele1	allele2` with numeric codes for the
/// sex chromosomes (23 = X, 24 = Y, 25 = PAR, 26 = MT) and `0` no-calls.
pub struct AncestryDNAParser {
    options: ParseOptions,
}

impl AncestryDNAParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn parse(&self, path: &Path) -> Result<MarkerSet> {
        read_markers(path, SourceFormat::Ancestry, self.options, |line| {
            self.parse_data_line(line)
        })
    }

    fn parse_data_line(&self, line: &str) -> Result<MarkerRecord, ParseErrorKind> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 5 {
            return Err(ParseErrorKind::FieldCount {
                expected: 5,
                found: fields.len(),
            });
        }
        // The two allele columns fuse into one genotype token.
        let token = format!("{}{}", fields[3].trim(), fields[4].trim());
        build_record(fields[0], fields[1], fields[2], &token)
    }
}

impl super::RawDataParser for AncestryDNAParser {
    fn parse(&self, path: &Path) -> Result<MarkerSet> {
        self.parse(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Base, Chromosome, Genotype};
    use std::io::Write;

    fn parse_str(content: &str) -> Result<MarkerSet> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        AncestryDNAParser::new(ParseOptions::default()).parse(file.path())
    }

    #[test]
    fn parses_typical_file() {
        let data = parse_str(
            "#AncestryDNA raw data download\n\
             rsid\tchromosome\tposition\tallele1\tallele2\n\
             rs4477212\t1\t82154\tA\tA\n\
             rs3094315\t1\t752566\tA\tG\n\
             rs11575897\t24\t2655180\tG\tG\n\
             rs193302985\t26\t9540\tT\tT\n",
        )
        .unwrap();

        assert_eq!(data.len(), 4);
        assert_eq!(data.format, SourceFormat::Ancestry);
        assert_eq!(
            data.get("rs3094315").unwrap().genotype,
            Genotype::Pair(Base::A, Base::G)
        );

        // Numeric sex-chromosome codes map onto the symbolic names and the
        // doubled hemizygous calls collapse.
        let y = data.get("rs11575897").unwrap();
        assert_eq!(y.chromosome, Chromosome::Y);
        assert_eq!(y.genotype, Genotype::Haploid(Base::G));
        assert_eq!(data.get("rs193302985").unwrap().chromosome, Chromosome::Mt);
    }

    #[test]
    fn zero_zero_is_a_no_call() {
        let data = parse_str("rs1\t1\t100\t0\t0\n").unwrap();
        assert_eq!(data.get("rs1").unwrap().genotype, Genotype::NoCall);
        assert!(!data.get("rs1").unwrap().partial_call);
    }

    #[test]
    fn one_sided_zero_is_partial() {
        let data = parse_str("rs1\t1\t100\tA\t0\n").unwrap();
        let record = data.get("rs1").unwrap();
        assert_eq!(record.genotype, Genotype::NoCall);
        assert!(record.partial_call);
    }

    #[test]
    fn rejects_four_column_line() {
        let err = parse_str("rs1\t1\t100\tAA\n").unwrap_err();
        assert!(err.to_string().contains("invalid record"));
    }

    #[test]
    fn x_code_23_keeps_diploid_genotype() {
        let data = parse_str("rs1\t23\t100\tT\tT\n").unwrap();
        let record = data.get("rs1").unwrap();
        assert_eq!(record.chromosome, Chromosome::X);
        assert_eq!(record.genotype, Genotype::Pair(Base::T, Base::T));
    }
}
