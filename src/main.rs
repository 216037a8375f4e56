use anyhow::{anyhow, bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::{generate, Shell};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

mod merge;
mod orientation;
mod output;
mod parsers;
mod reconcile;
mod report;
mod types;

use merge::{MergeEngine, MergeOutcome};
use output::MergedFileWriter;
use parsers::{detect_format, FileParser, ParseOptions};
use report::MergeReport;
use types::SourceFormat;

/// Consumer DNA raw-data merge tool
#[derive(Parser, Debug)]
#[command(
    name = "dna-merge",
    version,
    about = "Merges raw DNA files from consumer testing services",
    long_about = r#"
Merges the raw genotype exports of two consumer DNA-testing services into a
single file:

- Detects each file's layout (23andMe, AncestryDNA, MyHeritage) from content
- Infers whether the sources report on opposite DNA strands and aligns them
- Resolves no-calls and representation differences marker by marker
- Keeps the primary file's value whenever the sources genuinely conflict
- Writes a JSON merge report plus TSV sidecars listing every conflict

Compressed inputs (gzip, bzip2, xz) are read transparently.
"#
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Primary raw-data file (wins all conflicts)
    #[arg(value_name = "PRIMARY", value_hint = ValueHint::FilePath)]
    primary: Option<PathBuf>,

    /// Secondary raw-data file
    #[arg(value_name = "SECONDARY", value_hint = ValueHint::FilePath)]
    secondary: Option<PathBuf>,

    /// Merged output file
    #[arg(value_name = "OUTPUT", value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Primary file layout (autodetected from content when omitted)
    #[arg(long, value_enum, value_name = "FORMAT")]
    primary_format: Option<SourceFormat>,

    /// Secondary file layout (autodetected from content when omitted)
    #[arg(long, value_enum, value_name = "FORMAT")]
    secondary_format: Option<SourceFormat>,

    /// Output layout (defaults to the primary file's layout)
    #[arg(short = 'f', long, value_enum, value_name = "FORMAT")]
    output_format: Option<SourceFormat>,

    /// Write the JSON merge report here (default: <OUTPUT>.report.json)
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    report: Option<PathBuf>,

    /// Skip malformed input lines instead of aborting
    #[arg(long)]
    skip_invalid: bool,

    /// Do not write the conflict and identity-mismatch TSV sidecars
    #[arg(long)]
    no_sidecars: bool,

    /// Fail on identity mismatches or an uncertain strand decision
    #[arg(long)]
    strict: bool,

    /// Number of threads (0 = auto-detect)
    #[arg(
        short,
        long,
        default_value = "0",
        help = "Number of threads (0 = auto)"
    )]
    threads: usize,

    /// Interactive mode with prompts for all parameters
    #[arg(short, long, help = "Interactive mode with default values")]
    interactive: bool,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Generate shell completions
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate shell completions
    Completions { shell: Shell },
    /// List supported raw-data formats
    Formats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle shell completions
    if let Some(shell) = cli.completions {
        generate_completions(shell);
        return Ok(());
    }

    if let Some(Commands::Completions { shell }) = cli.command {
        generate_completions(shell);
        return Ok(());
    }

    if let Some(Commands::Formats) = cli.command {
        list_formats();
        return Ok(());
    }

    // Initialize logging
    init_logging(cli.verbose);

    // Run interactive mode if requested
    let config = if cli.interactive {
        run_interactive_mode()?
    } else {
        AppConfig::from_cli(&cli)?
    };

    // Initialize thread pool
    init_thread_pool(config.threads)?;

    info!("Starting raw-data merge");
    info!("Using {} threads", rayon::current_num_threads());

    run_merge(config)
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

fn list_formats() {
    println!("{}", style("Supported Raw-Data Formats:").bold().cyan());
    println!();

    let formats = vec![
        (
            "23andMe",
            "23andMe raw data (.txt)",
            "Tab-separated: rsid, chromosome, position, genotype",
        ),
        (
            "AncestryDNA",
            "AncestryDNA raw data (.txt)",
            "Tab-separated: rsid, chromosome, position, allele1, allele2",
        ),
        (
            "MyHeritage",
            "MyHeritage raw data (.csv)",
            "Quoted CSV: RSID, CHROMOSOME, POSITION, RESULT",
        ),
    ];

    for (name, ext, desc) in formats {
        println!("  {} - {}", style(name).green().bold(), style(ext).yellow());
        println!("         {}", style(desc).dim());
    }

    println!();
    println!(
        "{}",
        style("Layouts are detected from file content; gzip, bzip2 and xz inputs are read transparently.")
            .dim()
    );
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("dna_merge={}", level))
        .init();
}

fn init_thread_pool(threads: usize) -> Result<()> {
    let num_threads = if threads == 0 {
        num_cpus::get()
    } else {
        threads
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .map_err(|e| anyhow!("Failed to initialize thread pool: {}", e))?;

    Ok(())
}

fn run_interactive_mode() -> Result<AppConfig> {
    println!(
        "{}",
        style("╔══════════════════════════════════════════════════════════════╗").cyan()
    );
    println!(
        "{}",
        style("║           DNA Raw-Data Merge - Interactive Mode              ║")
            .cyan()
            .bold()
    );
    println!(
        "{}",
        style("╚══════════════════════════════════════════════════════════════╝").cyan()
    );
    println!();

    let theme = ColorfulTheme::default();

    // Input files
    let primary: String = Input::with_theme(&theme)
        .with_prompt("Primary raw-data file (wins conflicts)")
        .interact_text()?;

    let secondary: String = Input::with_theme(&theme)
        .with_prompt("Secondary raw-data file")
        .interact_text()?;

    let output: String = Input::with_theme(&theme)
        .with_prompt("Merged output file")
        .default("merged.txt".to_string())
        .interact_text()?;

    // Output layout
    let layouts = vec![
        "Same as primary",
        "23andMe",
        "AncestryDNA",
        "MyHeritage",
    ];

    let layout_idx = Select::with_theme(&theme)
        .with_prompt("Output layout")
        .default(0)
        .items(&layouts)
        .interact()?;

    let output_format = match layout_idx {
        1 => Some(SourceFormat::TwentyThreeAndMe),
        2 => Some(SourceFormat::Ancestry),
        3 => Some(SourceFormat::MyHeritage),
        _ => None,
    };

    // Strictness
    let skip_invalid = Confirm::with_theme(&theme)
        .with_prompt("Skip malformed input lines?")
        .default(false)
        .interact()?;

    let strict = Confirm::with_theme(&theme)
        .with_prompt("Fail on identity mismatches or uncertain strand orientation?")
        .default(false)
        .interact()?;

    // Threads
    let threads: usize = Input::with_theme(&theme)
        .with_prompt("Number of threads (0 = auto-detect)")
        .default(0)
        .interact_text()?;

    Ok(AppConfig {
        primary: PathBuf::from(primary),
        secondary: PathBuf::from(secondary),
        output: PathBuf::from(output),
        primary_format: None,
        secondary_format: None,
        output_format,
        report: None,
        skip_invalid,
        no_sidecars: false,
        strict,
        threads,
    })
}

fn run_merge(config: AppConfig) -> Result<()> {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?
            .progress_chars("#>-"),
    );

    let parser = FileParser::with_options(ParseOptions {
        skip_invalid: config.skip_invalid,
    });

    // Step 1: identify the layouts
    pb.set_message("Detecting file layouts...");
    let primary_format = resolve_format(&config.primary, config.primary_format)?;
    let secondary_format = resolve_format(&config.secondary, config.secondary_format)?;
    pb.set_position(5);

    info!(
        "Primary: {} ({})",
        config.primary.display(),
        primary_format
    );
    info!(
        "Secondary: {} ({})",
        config.secondary.display(),
        secondary_format
    );

    // Step 2: load both sources
    pb.set_message("Reading primary file...");
    let primary = parser
        .parse_as(&config.primary, primary_format)
        .with_context(|| format!("Failed to parse {}", config.primary.display()))?;
    pb.set_position(30);

    pb.set_message("Reading secondary file...");
    let secondary = parser
        .parse_as(&config.secondary, secondary_format)
        .with_context(|| format!("Failed to parse {}", config.secondary.display()))?;
    pb.set_position(55);

    info!(
        "Loaded {} primary and {} secondary markers",
        primary.len(),
        secondary.len()
    );
    for set in [&primary, &secondary] {
        if set.skipped_lines > 0 {
            warn!(
                "{} malformed lines skipped in {}",
                set.skipped_lines, set.source_path
            );
        }
        if set.duplicate_ids > 0 {
            warn!(
                "{} duplicate marker ids in {} (first occurrence kept)",
                set.duplicate_ids, set.source_path
            );
        }
    }

    // Step 3: orient and reconcile
    pb.set_message("Reconciling markers...");
    let outcome = MergeEngine::new().merge(&primary, &secondary);
    pb.set_position(80);

    // Step 4: write the merged file
    pb.set_message("Writing merged file...");
    let output_format = config.output_format.unwrap_or(primary_format);
    MergedFileWriter::new(output_format).write(
        &config.output,
        &outcome.records,
        &outcome.report,
    )?;
    pb.set_position(90);

    // Step 5: write the report and sidecars
    pb.set_message("Writing merge report...");
    let report_path = config
        .report
        .clone()
        .unwrap_or_else(|| MergeReport::default_path(&config.output));
    outcome.report.write_json(&report_path)?;

    let sidecars = if config.no_sidecars {
        Vec::new()
    } else {
        outcome.report.write_sidecars(&config.output)?
    };
    pb.set_position(100);

    pb.finish_with_message("Merge complete!");

    print_summary(&config, &outcome, &report_path, &sidecars);

    if config.strict {
        enforce_strict(&outcome.report)?;
    }

    Ok(())
}

fn resolve_format(path: &Path, explicit: Option<SourceFormat>) -> Result<SourceFormat> {
    match explicit {
        Some(format) => Ok(format),
        None => detect_format(path),
    }
}

fn print_summary(
    config: &AppConfig,
    outcome: &MergeOutcome,
    report_path: &Path,
    sidecars: &[PathBuf],
) {
    let report = &outcome.report;
    let counts = &report.dispositions;

    println!(
        "\n{} Merged {} markers into {}",
        style("✓").green().bold(),
        style(report.merged_markers).cyan(),
        style(config.output.display()).cyan()
    );
    println!(
        "  {}",
        style(format!(
            "{} agree, {} conflicts, {} primary-only, {} secondary-only, {} resolved from a single call, {} both no-call",
            counts.agree,
            counts.conflict,
            counts.primary_only,
            counts.secondary_only,
            counts.resolved_from_call,
            counts.both_no_call
        ))
        .dim()
    );

    if report.orientation.flip {
        println!(
            "  {} secondary genotypes were strand-complemented ({} over {} informative markers)",
            style("!").yellow().bold(),
            style(format!("{:.1}%", report.orientation.confidence * 100.0)).yellow(),
            report.orientation.evidence_count
        );
    }
    if report.low_confidence_orientation {
        println!(
            "  {} strand orientation is uncertain ({} informative markers); review the report",
            style("!").red().bold(),
            report.orientation.evidence_count
        );
    }
    if !report.identity_mismatches.is_empty() {
        println!(
            "  {} {} marker ids map to different loci and were excluded",
            style("✗").red(),
            report.identity_mismatches.len()
        );
    }

    println!("  Report: {}", style(report_path.display()).cyan());
    for sidecar in sidecars {
        println!("  Sidecar: {}", style(sidecar.display()).cyan());
    }
}

fn enforce_strict(report: &MergeReport) -> Result<()> {
    if report.low_confidence_orientation {
        bail!(
            "strand orientation is uncertain ({:.1}% confidence over {} informative markers)",
            report.orientation.confidence * 100.0,
            report.orientation.evidence_count
        );
    }
    if !report.identity_mismatches.is_empty() {
        bail!(
            "{} marker ids map to different loci in the two sources",
            report.identity_mismatches.len()
        );
    }
    Ok(())
}

#[derive(Debug)]
struct AppConfig {
    primary: PathBuf,
    secondary: PathBuf,
    output: PathBuf,
    primary_format: Option<SourceFormat>,
    secondary_format: Option<SourceFormat>,
    output_format: Option<SourceFormat>,
    report: Option<PathBuf>,
    skip_invalid: bool,
    no_sidecars: bool,
    strict: bool,
    threads: usize,
}

impl AppConfig {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let primary = cli
            .primary
            .clone()
            .ok_or_else(|| anyhow!("missing PRIMARY input file (or use --interactive)"))?;
        let secondary = cli
            .secondary
            .clone()
            .ok_or_else(|| anyhow!("missing SECONDARY input file (or use --interactive)"))?;
        let output = cli
            .output
            .clone()
            .ok_or_else(|| anyhow!("missing OUTPUT file (or use --interactive)"))?;

        Ok(Self {
            primary,
            secondary,
            output,
            primary_format: cli.primary_format,
            secondary_format: cli.secondary_format,
            output_format: cli.output_format,
            report: cli.report.clone(),
            skip_invalid: cli.skip_invalid,
            no_sidecars: cli.no_sidecars,
            strict: cli.strict,
            threads: cli.threads,
        })
    }
}
