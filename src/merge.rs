use rayon::prelude::*;
use tracing::{info, warn};

use crate::orientation::OrientationEstimator;
use crate::parsers::MarkerSet;
use crate::reconcile::{MarkerPair, MarkerReconciler};
use crate::report::{ConflictRecord, DispositionCounts, IdentityMismatchRecord, MergeReport};
use crate::types::{Chromosome, Disposition, Genotype, MarkerRecord};

/// One marker in the merged output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRecord {
    pub id: String,
    pub chromosome: Chromosome,
    pub position: u64,
    pub genotype: Genotype,
    pub disposition: Disposition,
}

/// Merged record set plus the statistics describing how it was produced.
#[derive(Debug)]
pub struct MergeOutcome {
    pub records: Vec<MergedRecord>,
    pub report: MergeReport,
}

enum WorkItem<'a> {
    Reconcile(MarkerPair<'a>),
    Mismatch(&'a MarkerRecord, &'a MarkerRecord),
}

enum Resolution {
    Keep(MergedRecord, Option<ConflictRecord>),
    Exclude(IdentityMismatchRecord),
}

/// Drives a whole merge: estimates the strand orientation once, then runs
/// every marker id from either source through the reconciler.
///
/// Output order is deterministic: the primary file's markers in their
/// original order, followed by secondary-only markers in theirs. Ids whose
/// chromosome or position disagree between the sources are excluded from
/// the output entirely and reported as identity mismatches.
pub struct MergeEngine;

impl MergeEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn merge(&self, primary: &MarkerSet, secondary: &MarkerSet) -> MergeOutcome {
        let estimate = OrientationEstimator::new().estimate(primary, secondary);
        if estimate.flip {
            info!(
                confidence = estimate.confidence,
                evidence = estimate.evidence_count,
                "secondary source reports on the opposite strand; complementing its genotypes"
            );
        } else {
            info!(
                confidence = estimate.confidence,
                evidence = estimate.evidence_count,
                "sources share a strand convention"
            );
        }
        if estimate.is_low_confidence() {
            warn!(
                confidence = estimate.confidence,
                evidence = estimate.evidence_count,
                "strand orientation evidence is thin or contradictory; review the merge report"
            );
        }

        let reconciler = MarkerReconciler::new(estimate.flip);

        let mut work: Vec<WorkItem> = Vec::with_capacity(primary.len() + secondary.len());
        for p in primary.iter() {
            match secondary.get(&p.id) {
                Some(s) if !p.same_locus(s) => work.push(WorkItem::Mismatch(p, s)),
                Some(s) => work.push(WorkItem::Reconcile(MarkerPair::Both(p, s))),
                None => work.push(WorkItem::Reconcile(MarkerPair::PrimaryOnly(p))),
            }
        }
        for s in secondary.iter() {
            if !primary.contains(&s.id) {
                work.push(WorkItem::Reconcile(MarkerPair::SecondaryOnly(s)));
            }
        }

        // Markers are independent once the flip decision is fixed, and the
        // indexed collect keeps the deterministic ordering.
        let resolutions: Vec<Resolution> = work
            .par_iter()
            .map(|item| Self::resolve(item, &reconciler))
            .collect();

        let mut records = Vec::with_capacity(resolutions.len());
        let mut dispositions = DispositionCounts::default();
        let mut conflicts = Vec::new();
        let mut identity_mismatches = Vec::new();
        for resolution in resolutions {
            match resolution {
                Resolution::Keep(record, conflict) => {
                    dispositions.record(record.disposition);
                    if let Some(conflict) = conflict {
                        conflicts.push(conflict);
                    }
                    records.push(record);
                }
                Resolution::Exclude(mismatch) => {
                    dispositions.record(Disposition::IdentityMismatch);
                    identity_mismatches.push(mismatch);
                }
            }
        }

        info!(
            merged = records.len(),
            agree = dispositions.agree,
            conflicts = dispositions.conflict,
            identity_mismatches = dispositions.identity_mismatch,
            "merge complete"
        );

        let report = MergeReport::new(
            primary,
            secondary,
            estimate,
            records.len() as u64,
            dispositions,
            conflicts,
            identity_mismatches,
        );

        MergeOutcome { records, report }
    }

    fn resolve(item: &WorkItem<'_>, reconciler: &MarkerReconciler) -> Resolution {
        match item {
            WorkItem::Reconcile(pair) => {
                let outcome = reconciler.reconcile(*pair);
                let source = match pair {
                    MarkerPair::PrimaryOnly(p) | MarkerPair::Both(p, _) => p,
                    MarkerPair::SecondaryOnly(s) => s,
                };
                let conflict = outcome.conflicting_secondary.map(|aligned| ConflictRecord {
                    id: source.id.clone(),
                    chromosome: source.chromosome.to_string(),
                    position: source.position,
                    primary: outcome.genotype.to_token(),
                    secondary: aligned.to_token(),
                });
                Resolution::Keep(
                    MergedRecord {
                        id: source.id.clone(),
                        chromosome: source.chromosome,
                        position: source.position,
                        genotype: outcome.genotype,
                        disposition: outcome.disposition,
                    },
                    conflict,
                )
            }
            WorkItem::Mismatch(p, s) => Resolution::Exclude(IdentityMismatchRecord {
                id: p.id.clone(),
                primary_chromosome: p.chromosome.to_string(),
                primary_position: p.position,
                secondary_chromosome: s.chromosome.to_string(),
                secondary_position: s.position,
            }),
        }
    }
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::new()
    }
}
