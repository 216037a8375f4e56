use anyhow::Result;
use std::path::Path;

use crate::parsers::{build_record, read_markers, MarkerSet, ParseErrorKind, ParseOptions};
use crate::types::{MarkerRecord, SourceFormat};

/// MyHeritage raw-data parser: comma-separated
/// `"RSID","CHROMOSOME","POSITION","RESULT"` with every field quoted.
pub struct MyHeritageParser {
    options: ParseOptions,
}

impl MyHeritageParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn parse(&self, path: &Path) -> Result<MarkerSet> {
        read_markers(path, SourceFormat::MyHeritage, self.options, |line| {
            self.parse_data_line(line)
        })
    }

    fn parse_data_line(&self, line: &str) -> Result<MarkerRecord, ParseErrorKind> {
        let fields: Vec<&str> = line
            .split(',')
            .map(|f| f.trim().trim_matches('"'))
            .collect();
        if fields.len() != 4 {
            return Err(ParseErrorKind::FieldCount {
                expected: 4,
                found: fields.len(),
            });
        }
        build_record(fields[0], fields[1], fields[2], fields[3])
    }
}

impl super::RawDataParser for MyHeritageParser {
    fn parse(&self, path: &Path) -> Result<MarkerSet> {
        self.parse(path)
    }
}
