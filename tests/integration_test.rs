use dna_merge::{
    detect_format, Disposition, FileParser, Genotype, MergeEngine, MergedFileWriter,
    ParseOptions, SourceFormat,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PRIMARY_23ANDME: &str = "\
# This data file generated by 23andMe at: Thu Mar 01 00:00:00 2018
# rsid\tchromosome\tposition\tgenotype
rs100\t1\t1000\tAA
rs101\t1\t2000\tGG
rs102\t2\t3000\tCC
rs103\t2\t4000\tAG
rs104\t3\t5000\t--
rs105\t3\t6000\tTT
rs106\t4\t7000\tAT
rs107\tY\t8000\tC
";

// The same sample exported by AncestryDNA on the opposite strand: every
// shared genotype is the complement of the primary value, except rs105
// which is a genuine conflict.
const SECONDARY_ANCESTRY: &str = "\
#AncestryDNA raw data download
rsid\tchromosome\tposition\tallele1\tallele2
rs100\t1\t1000\tT\tT
rs101\t1\t2000\tC\tC
rs102\t2\t3000\tG\tG
rs103\t2\t4000\tT\tC
rs104\t3\t5000\tG\tG
rs105\t3\t6000\tG\tG
rs106\t4\t7000\tA\tT
rs108\t5\t9000\tA\tG
rs109\t26\t500\tT\tT
";

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_detects_vendor_layouts_from_content() {
    let dir = TempDir::new().unwrap();
    let primary = write_file(dir.path(), "primary.txt", PRIMARY_23ANDME);
    let secondary = write_file(dir.path(), "secondary.txt", SECONDARY_ANCESTRY);

    assert_eq!(
        detect_format(&primary).unwrap(),
        SourceFormat::TwentyThreeAndMe
    );
    assert_eq!(detect_format(&secondary).unwrap(), SourceFormat::Ancestry);
}

#[test]
fn test_merges_opposite_strand_sources_end_to_end() {
    let dir = TempDir::new().unwrap();
    let primary_path = write_file(dir.path(), "primary.txt", PRIMARY_23ANDME);
    let secondary_path = write_file(dir.path(), "secondary.txt", SECONDARY_ANCESTRY);
    let output_path = dir.path().join("merged.txt");

    let parser = FileParser::new();
    let primary = parser.parse(&primary_path).unwrap();
    let secondary = parser.parse(&secondary_path).unwrap();
    assert_eq!(primary.len(), 8);
    assert_eq!(secondary.len(), 9);

    let outcome = MergeEngine::new().merge(&primary, &secondary);
    let report = &outcome.report;

    // Three homozygous markers vote, unanimously for the flip.
    assert!(report.orientation.flip);
    assert_eq!(report.orientation.evidence_count, 3);
    assert_eq!(report.orientation.confidence, 1.0);
    assert!(!report.low_confidence_orientation);

    // Primary order first, then secondary-only markers in their order.
    let ids: Vec<&str> = outcome.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(
        ids,
        [
            "rs100", "rs101", "rs102", "rs103", "rs104", "rs105", "rs106", "rs107", "rs108",
            "rs109"
        ]
    );

    let by_id = |id: &str| outcome.records.iter().find(|r| r.id == id).unwrap();

    // Heterozygous marker agrees only because the flip was applied to it.
    assert_eq!(by_id("rs103").disposition, Disposition::Agree);
    assert_eq!(by_id("rs103").genotype.to_token(), "AG");
    // Primary no-call was filled from the complemented secondary call.
    assert_eq!(by_id("rs104").disposition, Disposition::ResolvedFromCall);
    assert_eq!(by_id("rs104").genotype.to_token(), "CC");
    // True conflict keeps the primary value.
    assert_eq!(by_id("rs105").disposition, Disposition::Conflict);
    assert_eq!(by_id("rs105").genotype.to_token(), "TT");
    // Ambiguous pair cannot be broken by the flip.
    assert_eq!(by_id("rs106").disposition, Disposition::Agree);
    // Secondary-only markers arrive complemented, except haploid calls.
    assert_eq!(by_id("rs108").disposition, Disposition::SecondaryOnly);
    assert_eq!(by_id("rs108").genotype.to_token(), "TC");
    assert_eq!(by_id("rs109").genotype, Genotype::Haploid(dna_merge::Base::T));

    assert_eq!(report.dispositions.agree, 5);
    assert_eq!(report.dispositions.conflict, 1);
    assert_eq!(report.dispositions.primary_only, 1);
    assert_eq!(report.dispositions.secondary_only, 2);
    assert_eq!(report.dispositions.resolved_from_call, 1);
    assert_eq!(report.merged_markers, 10);
    assert_eq!(report.overlap, 7);
    assert_eq!(report.added_from_secondary, 2);

    // Write the merged file in the primary's layout and spot-check rows.
    MergedFileWriter::new(SourceFormat::TwentyThreeAndMe)
        .write(&output_path, &outcome.records, report)
        .unwrap();

    let content = fs::read_to_string(&output_path).unwrap();
    assert!(content.contains("# NOTE: the secondary source reported on the opposite strand;"));
    assert!(content.contains("rs104\t3\t5000\tCC"));
    assert!(content.contains("rs107\tY\t8000\tC"));
    assert!(content.contains("rs109\tMT\t500\tT"));

    // Report and sidecars land next to the output.
    let report_path = dir.path().join("merged.txt.report.json");
    report.write_json(&report_path).unwrap();
    let sidecars = report.write_sidecars(&output_path).unwrap();
    assert_eq!(sidecars.len(), 1);

    let conflicts =
        fs::read_to_string(dir.path().join("merged.txt.conflicts.tsv")).unwrap();
    assert!(conflicts.contains("rs105\t3\t6000\tTT\tCC"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json["orientation"]["flip"], true);
    assert_eq!(json["dispositions"]["conflict"], 1);
    assert_eq!(json["conflicts"][0]["id"], "rs105");
}

#[test]
fn test_identity_mismatches_are_quarantined() {
    let dir = TempDir::new().unwrap();
    let primary_path = write_file(
        dir.path(),
        "primary.txt",
        "rs1\t1\t100\tAA\nrs2\t1\t200\tCC\n",
    );
    let secondary_path = write_file(
        dir.path(),
        "secondary.txt",
        "rs1\t1\t100\tA\tA\nrs2\t7\t200\tC\tC\n",
    );

    let parser = FileParser::new();
    let primary = parser.parse(&primary_path).unwrap();
    let secondary = parser.parse(&secondary_path).unwrap();
    let outcome = MergeEngine::new().merge(&primary, &secondary);

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.report.dispositions.identity_mismatch, 1);
    assert_eq!(outcome.report.identity_mismatches[0].id, "rs2");

    let output_path = dir.path().join("merged.txt");
    MergedFileWriter::new(SourceFormat::TwentyThreeAndMe)
        .write(&output_path, &outcome.records, &outcome.report)
        .unwrap();
    let sidecars = outcome.report.write_sidecars(&output_path).unwrap();
    assert_eq!(sidecars.len(), 1);
    assert!(dir
        .path()
        .join("merged.txt.identity_mismatches.tsv")
        .exists());
}

#[test]
fn test_reads_gzip_compressed_input() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("primary.txt.gz");

    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(PRIMARY_23ANDME.as_bytes()).unwrap();
    fs::write(&path, encoder.finish().unwrap()).unwrap();

    assert_eq!(detect_format(&path).unwrap(), SourceFormat::TwentyThreeAndMe);
    let data = FileParser::new().parse(&path).unwrap();
    assert_eq!(data.len(), 8);
    assert_eq!(data.get("rs100").unwrap().genotype.to_token(), "AA");
}

#[test]
fn test_merged_output_reparses_in_every_layout() {
    let dir = TempDir::new().unwrap();
    let primary_path = write_file(dir.path(), "primary.txt", PRIMARY_23ANDME);
    let secondary_path = write_file(dir.path(), "secondary.txt", SECONDARY_ANCESTRY);

    let parser = FileParser::new();
    let primary = parser.parse(&primary_path).unwrap();
    let secondary = parser.parse(&secondary_path).unwrap();
    let outcome = MergeEngine::new().merge(&primary, &secondary);

    for (name, format) in [
        ("merged_23andme.txt", SourceFormat::TwentyThreeAndMe),
        ("merged_ancestry.txt", SourceFormat::Ancestry),
        ("merged_myheritage.csv", SourceFormat::MyHeritage),
    ] {
        let path = dir.path().join(name);
        MergedFileWriter::new(format)
            .write(&path, &outcome.records, &outcome.report)
            .unwrap();

        let reparsed = FileParser::new().parse(&path).unwrap();
        assert_eq!(reparsed.format, format, "{name}");
        assert_eq!(reparsed.len(), outcome.records.len(), "{name}");
        for record in &outcome.records {
            let loaded = reparsed.get(&record.id).unwrap();
            assert!(
                loaded.genotype.same_alleles(&record.genotype),
                "{name}: {} {} vs {}",
                record.id,
                loaded.genotype,
                record.genotype
            );
        }
    }
}

#[test]
fn test_skip_invalid_lines() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        dir.path(),
        "broken.txt",
        "rs1\t1\t100\tAA\nrs2\tbanana\t200\tCC\nrs3\t2\t300\tGT\n",
    );

    // Default is to abort on the malformed line.
    assert!(FileParser::new().parse(&path).is_err());

    let lenient = FileParser::with_options(ParseOptions { skip_invalid: true });
    let data = lenient.parse(&path).unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data.skipped_lines, 1);
}
