use anyhow::{Context, Result};
use chrono::Local;
use csv::WriterBuilder;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::fs;
use std::path::{Path, PathBuf};

use crate::orientation::OrientationEstimate;
use crate::parsers::MarkerSet;
use crate::types::Disposition;

/// Per-disposition tally over all reconciled markers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispositionCounts {
    pub agree: u64,
    pub conflict: u64,
    pub primary_only: u64,
    pub secondary_only: u64,
    pub both_no_call: u64,
    pub resolved_from_call: u64,
    pub identity_mismatch: u64,
}

impl DispositionCounts {
    pub fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Agree => self.agree += 1,
            Disposition::Conflict => self.conflict += 1,
            Disposition::PrimaryOnly => self.primary_only += 1,
            Disposition::SecondaryOnly => self.secondary_only += 1,
            Disposition::BothNoCall => self.both_no_call += 1,
            Disposition::ResolvedFromCall => self.resolved_from_call += 1,
            Disposition::IdentityMismatch => self.identity_mismatch += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.agree
            + self.conflict
            + self.primary_only
            + self.secondary_only
            + self.both_no_call
            + self.resolved_from_call
            + self.identity_mismatch
    }
}

/// A marker where both sources called and, after orientation alignment,
/// still disagree. The primary value is what the merged file carries.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictRecord {
    pub id: String,
    pub chromosome: String,
    pub position: u64,
    pub primary: String,
    pub secondary: String,
}

/// An id that names different loci in the two sources; dropped from the
/// merged output because neither side can be trusted.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityMismatchRecord {
    pub id: String,
    pub primary_chromosome: String,
    pub primary_position: u64,
    pub secondary_chromosome: String,
    pub secondary_position: u64,
}

/// Load statistics for one input file.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub path: String,
    pub format: String,
    pub markers: u64,
    pub called: u64,
    pub partial_calls: u64,
    pub duplicate_ids: u64,
    pub skipped_lines: u64,
}

impl SourceSummary {
    pub fn from_set(set: &MarkerSet) -> Self {
        Self {
            path: set.source_path.clone(),
            format: set.format.display_name().to_string(),
            markers: set.len() as u64,
            called: set.called() as u64,
            partial_calls: set.partial_calls,
            duplicate_ids: set.duplicate_ids,
            skipped_lines: set.skipped_lines,
        }
    }
}

/// Everything an operator needs to audit a merge: input statistics, the
/// orientation decision and its confidence, per-disposition counts, and the
/// full lists of conflicts and identity mismatches.
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub generated_at: String,
    pub version: String,
    pub primary: SourceSummary,
    pub secondary: SourceSummary,
    pub orientation: OrientationEstimate,
    pub low_confidence_orientation: bool,
    pub merged_markers: u64,
    /// Ids present in both sources, identity mismatches included.
    pub overlap: u64,
    /// Markers the secondary source contributed that the primary lacked.
    pub added_from_secondary: u64,
    pub dispositions: DispositionCounts,
    pub conflicts: Vec<ConflictRecord>,
    pub identity_mismatches: Vec<IdentityMismatchRecord>,
}

impl MergeReport {
    pub fn new(
        primary: &MarkerSet,
        secondary: &MarkerSet,
        orientation: OrientationEstimate,
        merged_markers: u64,
        dispositions: DispositionCounts,
        conflicts: Vec<ConflictRecord>,
        identity_mismatches: Vec<IdentityMismatchRecord>,
    ) -> Self {
        let overlap = dispositions.agree
            + dispositions.conflict
            + dispositions.both_no_call
            + dispositions.resolved_from_call
            + dispositions.identity_mismatch;

        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            primary: SourceSummary::from_set(primary),
            secondary: SourceSummary::from_set(secondary),
            orientation,
            low_confidence_orientation: orientation.is_low_confidence(),
            merged_markers,
            overlap,
            added_from_secondary: dispositions.secondary_only,
            dispositions,
            conflicts,
            identity_mismatches,
        }
    }

    /// Default report location: next to the merged file.
    pub fn default_path(output: &Path) -> PathBuf {
        appended_path(output, ".report.json")
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json_content =
            to_string_pretty(self).with_context(|| "Failed to serialize merge report to JSON")?;
        fs::write(path, json_content)
            .with_context(|| format!("Failed to write JSON report to {}", path.display()))?;
        Ok(())
    }

    /// Write the conflict and identity-mismatch tables next to the merged
    /// file. Empty tables produce no file. Returns the paths written.
    pub fn write_sidecars(&self, output: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        if !self.conflicts.is_empty() {
            let path = appended_path(output, ".conflicts.tsv");
            self.write_conflicts_tsv(&path)?;
            written.push(path);
        }
        if !self.identity_mismatches.is_empty() {
            let path = appended_path(output, ".identity_mismatches.tsv");
            self.write_mismatches_tsv(&path)?;
            written.push(path);
        }

        Ok(written)
    }

    fn write_conflicts_tsv(&self, path: &Path) -> Result<()> {
        let mut wtr = WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .with_context(|| format!("Failed to create TSV writer for {}", path.display()))?;

        wtr.write_record([
            "rsid",
            "chromosome",
            "position",
            "primary_genotype",
            "secondary_genotype",
        ])?;

        for conflict in &self.conflicts {
            let position = conflict.position.to_string();
            wtr.write_record(&[
                &conflict.id,
                &conflict.chromosome,
                &position,
                &conflict.primary,
                &conflict.secondary,
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }

    fn write_mismatches_tsv(&self, path: &Path) -> Result<()> {
        let mut wtr = WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .with_context(|| format!("Failed to create TSV writer for {}", path.display()))?;

        wtr.write_record([
            "rsid",
            "primary_chromosome",
            "primary_position",
            "secondary_chromosome",
            "secondary_position",
        ])?;

        for mismatch in &self.identity_mismatches {
            let primary_position = mismatch.primary_position.to_string();
            let secondary_position = mismatch.secondary_position.to_string();
            wtr.write_record(&[
                &mismatch.id,
                &mismatch.primary_chromosome,
                &primary_position,
                &mismatch.secondary_chromosome,
                &secondary_position,
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }
}

/// `output` with `suffix` appended to its full file name, so
/// `merged.txt` becomes e.g. `merged.txt.report.json`.
pub fn appended_path(output: &Path, suffix: &str) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
