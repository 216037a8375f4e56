use crate::types::{Chromosome, Disposition, Genotype, MarkerRecord};

/// One marker id as it appears across the two sources. `Both` requires the
/// sides to name the same locus; ids whose chromosome or position disagree
/// are screened out by the merge engine before reconciliation.
#[derive(Debug, Clone, Copy)]
pub enum MarkerPair<'a> {
    PrimaryOnly(&'a MarkerRecord),
    SecondaryOnly(&'a MarkerRecord),
    Both(&'a MarkerRecord, &'a MarkerRecord),
}

/// Outcome of reconciling one marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub genotype: Genotype,
    pub disposition: Disposition,
    /// Secondary genotype after orientation alignment, retained when the
    /// two sides genuinely disagree so the conflict can be reported.
    pub conflicting_secondary: Option<Genotype>,
}

impl Reconciled {
    fn new(genotype: Genotype, disposition: Disposition) -> Self {
        Self {
            genotype,
            disposition,
            conflicting_secondary: None,
        }
    }
}

/// Strand flipping applies only to diploid genotypes on the autosomes and
/// X. Haploid calls never complement: a single-stranded observation has no
/// meaningful orientation.
fn flip_applies(chromosome: Chromosome, genotype: &Genotype) -> bool {
    genotype.is_diploid() && matches!(chromosome, Chromosome::Autosome(_) | Chromosome::X)
}

/// Applies the fixed per-marker rules under one global flip decision.
/// Primary precedence throughout: whenever both sides hold a usable call
/// and still disagree, the primary value is kept and the secondary value
/// is surfaced through [`Reconciled::conflicting_secondary`].
pub struct MarkerReconciler {
    flip: bool,
}

impl MarkerReconciler {
    pub fn new(flip: bool) -> Self {
        Self { flip }
    }

    /// Secondary genotype as it reads on the primary's strand.
    pub fn align_secondary(&self, record: &MarkerRecord) -> Genotype {
        if self.flip && flip_applies(record.chromosome, &record.genotype) {
            record.genotype.complement()
        } else {
            record.genotype
        }
    }

    pub fn reconcile(&self, pair: MarkerPair<'_>) -> Reconciled {
        match pair {
            MarkerPair::PrimaryOnly(p) => {
                Reconciled::new(p.genotype, Disposition::PrimaryOnly)
            }
            MarkerPair::SecondaryOnly(s) => {
                Reconciled::new(self.align_secondary(s), Disposition::SecondaryOnly)
            }
            MarkerPair::Both(p, s) => {
                let aligned = self.align_secondary(s);
                match (p.genotype.is_call(), aligned.is_call()) {
                    (false, false) => {
                        Reconciled::new(Genotype::NoCall, Disposition::BothNoCall)
                    }
                    (true, false) => {
                        Reconciled::new(p.genotype, Disposition::ResolvedFromCall)
                    }
                    (false, true) => {
                        Reconciled::new(aligned, Disposition::ResolvedFromCall)
                    }
                    (true, true) => {
                        if p.genotype.same_alleles(&aligned) {
                            // Primary's allele order is kept for output
                            // stability.
                            Reconciled::new(p.genotype, Disposition::Agree)
                        } else {
                            Reconciled {
                                genotype: p.genotype,
                                disposition: Disposition::Conflict,
                                conflicting_secondary: Some(aligned),
                            }
                        }
                    }
                }
            }
        }
    }
}
