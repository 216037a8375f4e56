use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Characters the testing services use for "no usable data" at a marker.
/// `-` (23andMe), `0` (AncestryDNA), `N` (seen in some exports).
pub const NO_CALL_CHARS: &[char] = &['-', '0', 'N'];

/// A single DNA base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Base {
    A,
    C,
    G,
    T,
}

impl Base {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Base::A),
            'C' => Some(Base::C),
            'G' => Some(Base::G),
            'T' => Some(Base::T),
            _ => None,
        }
    }

    /// Watson-Crick complement: A<->T, C<->G. Involutive by construction.
    pub fn complement(self) -> Self {
        match self {
            Base::A => Base::T,
            Base::T => Base::A,
            Base::C => Base::G,
            Base::G => Base::C,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Base::A => 'A',
            Base::C => 'C',
            Base::G => 'G',
            Base::T => 'T',
        }
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Chromosome category as reported by consumer DNA services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chromosome {
    /// Autosomal chromosome, 1 through 22.
    Autosome(u8),
    X,
    Y,
    Mt,
}

impl Chromosome {
    /// Parse a chromosome field. Accepts an optional `chr` prefix, the
    /// symbolic names `X`/`Y`/`MT`/`M`, AncestryDNA's numeric codes
    /// (23 = X, 24 = Y, 25 = pseudoautosomal, 26 = MT), and the `XY`
    /// pseudoautosomal label used by 23andMe (mapped to X).
    pub fn parse(field: &str) -> Option<Self> {
        let s = field.trim();
        let s = s
            .strip_prefix("chr")
            .or_else(|| s.strip_prefix("CHR"))
            .unwrap_or(s);

        match s.to_ascii_uppercase().as_str() {
            "X" | "23" | "XY" | "25" => Some(Chromosome::X),
            "Y" | "24" => Some(Chromosome::Y),
            "MT" | "M" | "26" => Some(Chromosome::Mt),
            other => match other.parse::<u8>() {
                Ok(n) if (1..=22).contains(&n) => Some(Chromosome::Autosome(n)),
                _ => None,
            },
        }
    }

    pub fn is_autosome(self) -> bool {
        matches!(self, Chromosome::Autosome(_))
    }

    /// True for chromosomes carried in a single copy (or effectively so):
    /// genotypes there are haploid and carry no strand-orientation signal.
    pub fn is_haploid_context(self) -> bool {
        matches!(self, Chromosome::Y | Chromosome::Mt)
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chromosome::Autosome(n) => write!(f, "{}", n),
            Chromosome::X => write!(f, "X"),
            Chromosome::Y => write!(f, "Y"),
            Chromosome::Mt => write!(f, "MT"),
        }
    }
}

/// Errors raised while normalizing a raw genotype token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenotypeError {
    #[error("genotype token must be 1 or 2 characters, got {0:?}")]
    InvalidLength(String),
    #[error("invalid allele character {0:?}")]
    InvalidBase(char),
}

/// A typed genotype call. Diploid allele order is preserved as read so the
/// merged output can reproduce the primary file's representation exactly;
/// all comparisons go through [`Genotype::same_alleles`], which is
/// order-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Genotype {
    /// Two-allele call (autosomes, female X).
    Pair(Base, Base),
    /// Single-allele call (Y, MT, male X).
    Haploid(Base),
    /// No usable data at this marker.
    NoCall,
}

/// Result of normalizing one raw token: the typed genotype plus whether the
/// token was a malformed half-call (one sentinel, one base) that had to be
/// coerced to a no-call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalized {
    pub genotype: Genotype,
    pub partial: bool,
}

impl Genotype {
    /// Canonicalize a raw genotype token from either service.
    ///
    /// Tokens are 1 or 2 characters from `{A,C,G,T}` plus the no-call
    /// sentinels `-`, `0`, `N`, case-insensitive. On Y and MT a doubled
    /// homozygous token (`AA`) collapses to a haploid call; a single
    /// character is haploid on any chromosome. A token mixing one sentinel
    /// with one base is a partial call: coerced to no-call and flagged.
    pub fn normalize(token: &str, chromosome: Chromosome) -> Result<Normalized, GenotypeError> {
        let token = token.trim();
        let mut chars = [None::<char>; 2];
        let mut len = 0usize;
        for c in token.chars() {
            if len == 2 {
                return Err(GenotypeError::InvalidLength(token.to_string()));
            }
            chars[len] = Some(c.to_ascii_uppercase());
            len += 1;
        }

        let classify = |c: char| -> Result<Option<Base>, GenotypeError> {
            if NO_CALL_CHARS.contains(&c) {
                Ok(None)
            } else {
                Base::from_char(c)
                    .map(Some)
                    .ok_or(GenotypeError::InvalidBase(c))
            }
        };

        match (chars[0], chars[1]) {
            (None, _) => Err(GenotypeError::InvalidLength(token.to_string())),
            (Some(c), None) => Ok(Normalized {
                genotype: match classify(c)? {
                    Some(base) => Genotype::Haploid(base),
                    None => Genotype::NoCall,
                },
                partial: false,
            }),
            (Some(c1), Some(c2)) => match (classify(c1)?, classify(c2)?) {
                (Some(a), Some(b)) => {
                    let genotype = if chromosome.is_haploid_context() && a == b {
                        Genotype::Haploid(a)
                    } else {
                        Genotype::Pair(a, b)
                    };
                    Ok(Normalized {
                        genotype,
                        partial: false,
                    })
                }
                (None, None) => Ok(Normalized {
                    genotype: Genotype::NoCall,
                    partial: false,
                }),
                _ => Ok(Normalized {
                    genotype: Genotype::NoCall,
                    partial: true,
                }),
            },
        }
    }

    pub fn is_no_call(&self) -> bool {
        matches!(self, Genotype::NoCall)
    }

    pub fn is_call(&self) -> bool {
        !self.is_no_call()
    }

    /// True only for a diploid pair of identical alleles. Haploid calls do
    /// not count: the orientation vote needs two observed strands.
    pub fn is_homozygous(&self) -> bool {
        matches!(self, Genotype::Pair(a, b) if a == b)
    }

    pub fn is_heterozygous(&self) -> bool {
        matches!(self, Genotype::Pair(a, b) if a != b)
    }

    pub fn is_diploid(&self) -> bool {
        matches!(self, Genotype::Pair(_, _))
    }

    /// True when the allele set equals its own complement set ({A,T} or
    /// {C,G}): indistinguishable from its strand flip, so it carries no
    /// orientation information.
    pub fn is_strand_ambiguous(&self) -> bool {
        matches!(self, Genotype::Pair(a, b) if *b == a.complement())
    }

    /// Complement every allele, preserving order. No-calls complement to
    /// themselves.
    pub fn complement(&self) -> Self {
        match *self {
            Genotype::Pair(a, b) => Genotype::Pair(a.complement(), b.complement()),
            Genotype::Haploid(a) => Genotype::Haploid(a.complement()),
            Genotype::NoCall => Genotype::NoCall,
        }
    }

    /// The allele set, deduplicated and sorted. A doubled call (`TT`) and a
    /// haploid call (`T`) have the same set, which makes the single- and
    /// two-letter representations of a hemizygous call compare equal.
    fn allele_set(&self) -> ([Option<Base>; 2], usize) {
        match *self {
            Genotype::Pair(a, b) => {
                if a == b {
                    ([Some(a), None], 1)
                } else if a < b {
                    ([Some(a), Some(b)], 2)
                } else {
                    ([Some(b), Some(a)], 2)
                }
            }
            Genotype::Haploid(a) => ([Some(a), None], 1),
            Genotype::NoCall => ([None, None], 0),
        }
    }

    /// Order- and multiplicity-insensitive equality: `AG` == `GA`,
    /// `T` == `TT`. Two no-calls compare equal.
    pub fn same_alleles(&self, other: &Genotype) -> bool {
        self.allele_set() == other.allele_set()
    }

    /// Canonical token form: `AG`, `A`, or `--`.
    pub fn to_token(&self) -> String {
        match *self {
            Genotype::Pair(a, b) => format!("{}{}", a.as_char(), b.as_char()),
            Genotype::Haploid(a) => a.as_char().to_string(),
            Genotype::NoCall => "--".to_string(),
        }
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_token())
    }
}

/// One normalized line from a source file. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerRecord {
    /// Vendor-assigned reference SNP id (e.g. `rs4477212`).
    pub id: String,
    pub chromosome: Chromosome,
    /// Physical coordinate; used only to cross-check marker identity.
    pub position: u64,
    pub genotype: Genotype,
    /// Raw token was a half-call coerced to no-call.
    pub partial_call: bool,
}

impl MarkerRecord {
    /// Same physical marker: chromosome and position both agree.
    pub fn same_locus(&self, other: &MarkerRecord) -> bool {
        self.chromosome == other.chromosome && self.position == other.position
    }
}

/// How a marker was resolved during the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    /// Both sources called the same genotype (after orientation and
    /// representation normalization).
    Agree,
    /// Both sources called, values genuinely differ; primary wins.
    Conflict,
    /// Marker present only in the primary source.
    PrimaryOnly,
    /// Marker present only in the secondary source.
    SecondaryOnly,
    /// Neither source has usable data.
    BothNoCall,
    /// Exactly one source called; its value was taken.
    ResolvedFromCall,
    /// Same id maps to different chromosome/position across sources;
    /// excluded from the merged output.
    IdentityMismatch,
}

/// Raw-data layouts of the supported testing services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum SourceFormat {
    /// 23andMe: tab-separated rsid / chromosome / position / genotype.
    #[value(name = "23andme")]
    TwentyThreeAndMe,
    /// AncestryDNA: tab-separated rsid / chromosome / position / allele1 / allele2.
    #[value(name = "ancestry")]
    Ancestry,
    /// MyHeritage: quoted CSV RSID / CHROMOSOME / POSITION / RESULT.
    #[value(name = "myheritage")]
    MyHeritage,
}

impl SourceFormat {
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceFormat::TwentyThreeAndMe => "23andMe",
            SourceFormat::Ancestry => "AncestryDNA",
            SourceFormat::MyHeritage => "MyHeritage",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
