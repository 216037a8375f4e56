use anyhow::{Context, Result};
use chrono::Local;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::merge::MergedRecord;
use crate::report::MergeReport;
use crate::types::{Genotype, SourceFormat};

/// Writes the merged record set in one of the vendor layouts, preceded by a
/// comment header describing how the merge went. The record order is taken
/// as given.
pub struct MergedFileWriter {
    format: SourceFormat,
}

impl MergedFileWriter {
    pub fn new(format: SourceFormat) -> Self {
        Self { format }
    }

    pub fn write(
        &self,
        path: &Path,
        records: &[MergedRecord],
        report: &MergeReport,
    ) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        self.write_header(&mut writer, report)?;
        for record in records {
            writeln!(writer, "{}", self.render_row(record))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    fn write_header(&self, writer: &mut impl Write, report: &MergeReport) -> Result<()> {
        writeln!(writer, "# Merged DNA raw data file")?;
        writeln!(
            writer,
            "# Generated on: {} by {} v{}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        )?;
        writeln!(
            writer,
            "# Primary source: {} ({} format)",
            report.primary.path, report.primary.format
        )?;
        writeln!(
            writer,
            "# Secondary source: {} ({} format)",
            report.secondary.path, report.secondary.format
        )?;
        if report.orientation.flip {
            writeln!(
                writer,
                "# NOTE: the secondary source reported on the opposite strand;"
            )?;
            writeln!(
                writer,
                "#       its genotypes were complemented to match the primary source"
            )?;
        }
        writeln!(
            writer,
            "# Orientation confidence: {:.1}% over {} informative markers",
            report.orientation.confidence * 100.0,
            report.orientation.evidence_count
        )?;
        writeln!(
            writer,
            "# Markers: {} merged, {} agree, {} conflicts (primary value kept), {} identity mismatches excluded",
            report.merged_markers,
            report.dispositions.agree,
            report.dispositions.conflict,
            report.dispositions.identity_mismatch
        )?;
        writeln!(writer, "#")?;
        writeln!(writer, "{}", self.column_header())?;
        Ok(())
    }

    fn column_header(&self) -> &'static str {
        match self.format {
            SourceFormat::TwentyThreeAndMe => "rsid\tchromosome\tposition\tgenotype",
            SourceFormat::Ancestry => "rsid\tchromosome\tposition\tallele1\tallele2",
            SourceFormat::MyHeritage => "\"RSID\",\"CHROMOSOME\",\"POSITION\",\"RESULT\"",
        }
    }

    fn render_row(&self, record: &MergedRecord) -> String {
        match self.format {
            SourceFormat::TwentyThreeAndMe => format!(
                "{}\t{}\t{}\t{}",
                record.id,
                record.chromosome,
                record.position,
                record.genotype.to_token()
            ),
            SourceFormat::Ancestry => {
                let (allele1, allele2) = ancestry_alleles(&record.genotype);
                format!(
                    "{}\t{}\t{}\t{}\t{}",
                    record.id, record.chromosome, record.position, allele1, allele2
                )
            }
            SourceFormat::MyHeritage => format!(
                "\"{}\",\"{}\",\"{}\",\"{}\"",
                record.id,
                record.chromosome,
                record.position,
                record.genotype.to_token()
            ),
        }
    }
}

/// The AncestryDNA layout has no single-allele representation: haploid
/// calls are doubled and a no-call is `0 0`.
fn ancestry_alleles(genotype: &Genotype) -> (char, char) {
    match *genotype {
        Genotype::Pair(a, b) => (a.as_char(), b.as_char()),
        Genotype::Haploid(a) => (a.as_char(), a.as_char()),
        Genotype::NoCall => ('0', '0'),
    }
}
