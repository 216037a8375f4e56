use anyhow::{anyhow, Context, Result};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{Chromosome, Genotype, GenotypeError, MarkerRecord, SourceFormat};

pub mod ancestry;
pub mod myheritage;
pub mod twentythree;

pub use ancestry::AncestryDNAParser;
pub use myheritage::MyHeritageParser;
pub use twentythree::TwentyThreeAndMeParser;

/// How many leading lines to inspect when autodetecting a file's format.
const DETECT_SCAN_LINES: u32 = 100;

/// Common interface over the vendor-specific raw-file parsers.
pub trait RawDataParser {
    fn parse(&self, path: &Path) -> Result<MarkerSet>;
}

/// Line-level strictness for the vendor parsers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Skip malformed lines (with a warning) instead of aborting.
    pub skip_invalid: bool,
}

/// All markers read from one source file, in file order, with an id index
/// for random access. Duplicate ids keep the first occurrence.
#[derive(Debug, Clone)]
pub struct MarkerSet {
    pub source_path: String,
    pub format: SourceFormat,
    records: Vec<MarkerRecord>,
    index: HashMap<String, usize>,
    /// Lines whose id repeated an earlier one; dropped, first kept.
    pub duplicate_ids: u64,
    /// Tokens with one sentinel and one base, coerced to no-call.
    pub partial_calls: u64,
    /// Malformed lines dropped because skipping was requested.
    pub skipped_lines: u64,
}

impl MarkerSet {
    pub fn new(source_path: String, format: SourceFormat) -> Self {
        Self {
            source_path,
            format,
            records: Vec::new(),
            index: HashMap::new(),
            duplicate_ids: 0,
            partial_calls: 0,
            skipped_lines: 0,
        }
    }

    pub fn insert(&mut self, record: MarkerRecord) {
        match self.index.entry(record.id.clone()) {
            Entry::Occupied(_) => {
                self.duplicate_ids += 1;
                debug!("duplicate marker id {}; first occurrence kept", record.id);
            }
            Entry::Vacant(slot) => {
                if record.partial_call {
                    self.partial_calls += 1;
                }
                slot.insert(self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&MarkerRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MarkerRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[MarkerRecord] {
        &self.records
    }

    /// Markers with at least one observed allele.
    pub fn called(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.genotype.is_call())
            .count()
    }
}

/// A malformed line, with its file location and offending text.
#[derive(Debug, Error)]
#[error("invalid record at {path}:{line}: {raw:?}")]
pub struct ParseError {
    pub path: String,
    pub line: u64,
    pub raw: String,
    #[source]
    pub kind: ParseErrorKind,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("unrecognized chromosome {0:?}")]
    Chromosome(String),
    #[error("invalid position {0:?}")]
    Position(String),
    #[error(transparent)]
    Genotype(#[from] GenotypeError),
}

/// Open a raw-data file for reading, transparently decompressing gzip,
/// bzip2, and xz containers. Detection is by magic bytes, not extension.
pub fn open_file(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let magic = reader
        .fill_buf()
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let decoded: Box<dyn BufRead + Send> = if magic.starts_with(&[0x1f, 0x8b]) {
        Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(reader)))
    } else if magic.starts_with(b"BZh") {
        Box::new(BufReader::new(bzip2::read::MultiBzDecoder::new(reader)))
    } else if magic.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
        Box::new(BufReader::new(xz2::read::XzDecoder::new(reader)))
    } else {
        Box::new(reader)
    };

    Ok(decoded)
}

/// Identify which service produced a raw-data file.
///
/// The vendor banner in the comment header is checked first; files with a
/// stripped header fall back to the shape of the first data line (quoted
/// CSV for MyHeritage, otherwise 4 vs 5 tab-separated fields).
pub fn detect_format(path: &Path) -> Result<SourceFormat> {
    let mut reader = open_file(path)?;
    let mut line = String::new();
    let mut inspected = 0u32;

    while inspected < DETECT_SCAN_LINES && reader.read_line(&mut line)? > 0 {
        inspected += 1;
        let trimmed = line.trim().trim_start_matches('\u{feff}');

        if trimmed.starts_with('#') {
            // Full banner phrases, not bare vendor names: merged files name
            // their sources in the comment header and must not match here.
            if trimmed.contains("generated by 23andMe") {
                return Ok(SourceFormat::TwentyThreeAndMe);
            }
            if trimmed.contains("AncestryDNA raw data") {
                return Ok(SourceFormat::Ancestry);
            }
            if trimmed.contains("MyHeritage DNA raw data") {
                return Ok(SourceFormat::MyHeritage);
            }
            line.clear();
            continue;
        }
        if trimmed.is_empty() || is_column_header(trimmed) {
            line.clear();
            continue;
        }

        // First data line: probe the layout directly.
        if trimmed.starts_with('"') {
            return Ok(SourceFormat::MyHeritage);
        }
        let fields = trimmed.split('\t').count();
        return match fields {
            4 => Ok(SourceFormat::TwentyThreeAndMe),
            5 => Ok(SourceFormat::Ancestry),
            _ if trimmed.split(',').count() == 4 => Ok(SourceFormat::MyHeritage),
            _ => Err(anyhow!(
                "Cannot detect format of {}: first data line has {} tab-separated fields",
                path.display(),
                fields
            )),
        };
    }

    Err(anyhow!(
        "Cannot detect format of {}: no data lines in the first {} lines",
        path.display(),
        DETECT_SCAN_LINES
    ))
}

/// Uncommented column-header line some exports carry
/// (`rsid	chromosome	...`, `"RSID","CHROMOSOME",...`).
fn is_column_header(line: &str) -> bool {
    line.split(['\t', ','])
        .next()
        .map(|first| first.trim().trim_matches('"').eq_ignore_ascii_case("rsid"))
        .unwrap_or(false)
}

/// Shared line loop for the vendor parsers: skips comments, blank lines and
/// column headers, tracks line numbers for error reporting, and applies the
/// skip-invalid policy uniformly.
pub(crate) fn read_markers<F>(
    path: &Path,
    format: SourceFormat,
    options: ParseOptions,
    mut parse_line: F,
) -> Result<MarkerSet>
where
    F: FnMut(&str) -> Result<MarkerRecord, ParseErrorKind>,
{
    let mut reader = open_file(path)?;
    let mut data = MarkerSet::new(path.to_string_lossy().into_owned(), format);

    let mut line = String::new();
    let mut line_no = 0u64;
    while reader.read_line(&mut line)? > 0 {
        line_no += 1;
        let trimmed = line.trim().trim_start_matches('\u{feff}');
        if trimmed.is_empty() || trimmed.starts_with('#') || is_column_header(trimmed) {
            line.clear();
            continue;
        }

        match parse_line(trimmed) {
            Ok(record) => data.insert(record),
            Err(kind) => {
                if options.skip_invalid {
                    warn!(
                        "{}:{}: {} in {:?}; line skipped",
                        path.display(),
                        line_no,
                        kind,
                        trimmed
                    );
                    data.skipped_lines += 1;
                } else {
                    return Err(ParseError {
                        path: path.to_string_lossy().into_owned(),
                        line: line_no,
                        raw: trimmed.to_string(),
                        kind,
                    }
                    .into());
                }
            }
        }
        line.clear();
    }

    Ok(data)
}

/// Assemble a record from the field slices common to every layout.
pub(crate) fn build_record(
    id: &str,
    chromosome: &str,
    position: &str,
    genotype: &str,
) -> Result<MarkerRecord, ParseErrorKind> {
    let chromosome = Chromosome::parse(chromosome)
        .ok_or_else(|| ParseErrorKind::Chromosome(chromosome.trim().to_string()))?;
    let position: u64 = position
        .trim()
        .parse()
        .map_err(|_| ParseErrorKind::Position(position.trim().to_string()))?;
    let normalized = Genotype::normalize(genotype, chromosome)?;

    Ok(MarkerRecord {
        id: id.trim().to_string(),
        chromosome,
        position,
        genotype: normalized.genotype,
        partial_call: normalized.partial,
    })
}

/// Front door for reading raw-data files: detects the format when it is not
/// pinned by the caller and dispatches to the matching vendor parser.
pub struct FileParser {
    options: ParseOptions,
}

impl FileParser {
    pub fn new() -> Self {
        Self {
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    /// Parse `path`, autodetecting the source format from its content.
    pub fn parse(&self, path: &Path) -> Result<MarkerSet> {
        let format = detect_format(path)?;
        self.parse_as(path, format)
    }

    /// Parse `path` as a known format, bypassing detection.
    pub fn parse_as(&self, path: &Path, format: SourceFormat) -> Result<MarkerSet> {
        let parser: Box<dyn RawDataParser> = match format {
            SourceFormat::TwentyThreeAndMe => {
                Box::new(TwentyThreeAndMeParser::new(self.options))
            }
            SourceFormat::Ancestry => Box::new(AncestryDNAParser::new(self.options)),
            SourceFormat::MyHeritage => Box::new(MyHeritageParser::new(self.options)),
        };
        parser.parse(path)
    }
}

impl Default for FileParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Base;
    use std::io::{Read, Write};

    fn write_temp(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    fn record(id: &str, partial: bool) -> MarkerRecord {
        MarkerRecord {
            id: id.to_string(),
            chromosome: Chromosome::Autosome(1),
            position: 100,
            genotype: Genotype::Pair(Base::A, Base::A),
            partial_call: partial,
        }
    }

    #[test]
    fn marker_set_keeps_first_duplicate() {
        let mut set = MarkerSet::new("mem".to_string(), SourceFormat::TwentyThreeAndMe);
        let mut first = record("rs1", false);
        first.position = 1;
        set.insert(first);
        let mut second = record("rs1", false);
        second.position = 2;
        set.insert(second);

        assert_eq!(set.len(), 1);
        assert_eq!(set.duplicate_ids, 1);
        assert_eq!(set.get("rs1").unwrap().position, 1);
    }

    #[test]
    fn marker_set_counts_partial_calls_once() {
        let mut set = MarkerSet::new("mem".to_string(), SourceFormat::Ancestry);
        set.insert(record("rs1", true));
        set.insert(record("rs1", true));
        assert_eq!(set.partial_calls, 1);
        assert_eq!(set.duplicate_ids, 1);
    }

    #[test]
    fn detects_23andme_by_banner() {
        let file = write_temp(
            b"# This data file generated by 23andMe at: Thu Mar 01 00:00:00 2018\n\
              rs1\t1\t100\tAA\n",
        );
        assert_eq!(
            detect_format(file.path()).unwrap(),
            SourceFormat::TwentyThreeAndMe
        );
    }

    #[test]
    fn detects_ancestry_by_banner() {
        let file = write_temp(b"#AncestryDNA raw data download\nrs1\t1\t100\tA\tA\n");
        assert_eq!(detect_format(file.path()).unwrap(), SourceFormat::Ancestry);
    }

    #[test]
    fn detects_by_field_count_without_banner() {
        let four = write_temp(b"rs1\t1\t100\tAA\n");
        assert_eq!(
            detect_format(four.path()).unwrap(),
            SourceFormat::TwentyThreeAndMe
        );

        let five = write_temp(b"rs1\t1\t100\tA\tA\n");
        assert_eq!(detect_format(five.path()).unwrap(), SourceFormat::Ancestry);
    }

    #[test]
    fn detects_myheritage_quoted_csv() {
        let file = write_temp(
            b"\"RSID\",\"CHROMOSOME\",\"POSITION\",\"RESULT\"\n\"rs1\",\"1\",\"100\",\"AA\"\n",
        );
        assert_eq!(
            detect_format(file.path()).unwrap(),
            SourceFormat::MyHeritage
        );
    }

    #[test]
    fn merged_file_headers_do_not_confuse_detection() {
        // A merged file names its sources in the comment header; the layout
        // of the data lines is what counts.
        let file = write_temp(
            b"# Merged DNA raw data file\n\
              # Primary source: a.txt (23andMe format)\n\
              # Secondary source: b.txt (AncestryDNA format)\n\
              rsid\tchromosome\tposition\tallele1\tallele2\n\
              rs1\t1\t100\tA\tA\n",
        );
        assert_eq!(detect_format(file.path()).unwrap(), SourceFormat::Ancestry);
    }

    #[test]
    fn detection_fails_on_unrecognized_layout() {
        let file = write_temp(b"rs1;1;100;AA\n");
        assert!(detect_format(file.path()).is_err());
    }

    #[test]
    fn open_file_reads_gzip_by_magic_bytes() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"rs1\t1\t100\tAA\n").unwrap();
        let file = write_temp(&encoder.finish().unwrap());

        let mut reader = open_file(file.path()).unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "rs1\t1\t100\tAA\n");
    }

    #[test]
    fn open_file_passes_plain_text_through() {
        let file = write_temp(b"plain\n");
        let mut reader = open_file(file.path()).unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "plain\n");
    }

    #[test]
    fn column_header_recognition() {
        assert!(is_column_header("rsid\tchromosome\tposition\tgenotype"));
        assert!(is_column_header(
            "rsid\tchromosome\tposition\tallele1\tallele2"
        ));
        assert!(is_column_header("\"RSID\",\"CHROMOSOME\",\"POSITION\",\"RESULT\""));
        assert!(!is_column_header("rs123\t1\t100\tAA"));
    }

    #[test]
    fn build_record_reports_field_errors() {
        assert_eq!(
            build_record("rs1", "99", "100", "AA").unwrap_err(),
            ParseErrorKind::Chromosome("99".to_string())
        );
        assert_eq!(
            build_record("rs1", "1", "abc", "AA").unwrap_err(),
            ParseErrorKind::Position("abc".to_string())
        );
        assert!(matches!(
            build_record("rs1", "1", "100", "AZ").unwrap_err(),
            ParseErrorKind::Genotype(_)
        ));
    }
}
