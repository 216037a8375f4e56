//! # DNA Raw-Data Merger
//!
//! Merges the raw genotype exports of two consumer DNA-testing services into
//! a single consistent call set, reconciling strand-orientation differences
//! and per-marker disagreements along the way.
//!
//! ## Features
//!
//! - Content-based detection of the 23andMe, AncestryDNA and MyHeritage layouts
//! - Transparent reading of gzip, bzip2 and xz compressed inputs
//! - Global strand-orientation inference from homozygous marker votes
//! - Per-marker reconciliation with primary-source precedence on conflicts
//! - Deterministic output order: primary file order, then secondary-only markers
//! - JSON merge report plus TSV sidecars listing conflicts and identity mismatches
//! - Multi-threaded reconciliation of large marker sets

pub mod merge;
pub mod orientation;
pub mod output;
pub mod parsers;
pub mod reconcile;
pub mod report;
pub mod types;

// Re-export key types
pub use merge::{MergeEngine, MergeOutcome, MergedRecord};
pub use orientation::{OrientationEstimate, OrientationEstimator};
pub use output::MergedFileWriter;
pub use parsers::{detect_format, FileParser, MarkerSet, ParseError, ParseOptions};
pub use reconcile::{MarkerPair, MarkerReconciler, Reconciled};
pub use report::{DispositionCounts, MergeReport};
pub use types::*;
