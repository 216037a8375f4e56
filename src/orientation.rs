use serde::Serialize;
use tracing::debug;

use crate::parsers::MarkerSet;
use crate::types::Chromosome;

/// Votes backing the winning side must reach this share of the total before
/// the strand decision is considered trustworthy.
pub const MIN_CONFIDENCE: f64 = 0.90;

/// Outcome of the global strand-orientation inference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrientationEstimate {
    /// Complement every eligible secondary genotype before comparing.
    pub flip: bool,
    /// Share of votes backing the decision; 1.0 when there is no evidence.
    pub confidence: f64,
    /// Markers that cast a vote.
    pub evidence_count: u64,
    pub same_votes: u64,
    pub flipped_votes: u64,
}

impl OrientationEstimate {
    /// True when the decision rests on thin or contradictory evidence and
    /// the operator should double-check the inputs.
    pub fn is_low_confidence(&self) -> bool {
        self.evidence_count == 0 || self.confidence < MIN_CONFIDENCE
    }
}

/// Decides, once per merge, whether the secondary source reports genotypes
/// on the opposite strand from the primary source.
///
/// Consumer files are internally consistent, so the decision is global and
/// binary: either every eligible secondary genotype is complemented or none
/// is. Evidence comes from markers called in both sources where the primary
/// is homozygous diploid; such a genotype either matches the secondary
/// directly (same strand) or matches its complement (flipped), and anything
/// else is a value conflict that casts no vote. Y, MT and hemizygous X
/// markers are excluded: haploid calls carry no reliable strand signal.
pub struct OrientationEstimator;

impl OrientationEstimator {
    pub fn new() -> Self {
        Self
    }

    pub fn estimate(&self, primary: &MarkerSet, secondary: &MarkerSet) -> OrientationEstimate {
        let mut same_votes = 0u64;
        let mut flipped_votes = 0u64;

        for p in primary.iter() {
            if !matches!(p.chromosome, Chromosome::Autosome(_) | Chromosome::X) {
                continue;
            }
            // Only a homozygous diploid primary reveals strand unambiguously.
            if !p.genotype.is_homozygous() {
                continue;
            }
            let Some(s) = secondary.get(&p.id) else {
                continue;
            };
            // Ids naming different loci are excluded from the merge outright
            // and must not influence the strand decision either.
            if !p.same_locus(s) {
                continue;
            }
            if !s.genotype.is_call() {
                continue;
            }
            if p.chromosome == Chromosome::X && !s.genotype.is_diploid() {
                continue;
            }

            if s.genotype.same_alleles(&p.genotype) {
                same_votes += 1;
            } else if s.genotype.same_alleles(&p.genotype.complement()) {
                flipped_votes += 1;
            }
        }

        let evidence_count = same_votes + flipped_votes;
        let flip = flipped_votes > same_votes;
        let confidence = if evidence_count == 0 {
            1.0
        } else {
            same_votes.max(flipped_votes) as f64 / evidence_count as f64
        };

        debug!(
            same_votes,
            flipped_votes, flip, confidence, "orientation estimate"
        );

        OrientationEstimate {
            flip,
            confidence,
            evidence_count,
            same_votes,
            flipped_votes,
        }
    }
}

impl Default for OrientationEstimator {
    fn default() -> Self {
        Self::new()
    }
}
