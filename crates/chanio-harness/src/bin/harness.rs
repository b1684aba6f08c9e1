//! CLI entrypoint for the chanio scenario harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use chanio_core::ModeDescriptor;
use chanio_harness::report::FixtureDigest;
use chanio_harness::structured_log::{LogEmitter, validate_log_file};
use chanio_harness::verify::VerificationSummary;
use chanio_harness::{ConformanceReport, FixtureSet, TestRunner, digest};

/// Scenario tooling for chanio.
#[derive(Debug, Parser)]
#[command(name = "chanio-harness")]
#[command(about = "Scenario fixtures and reports for chanio channels")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every fixture set in a directory.
    Verify {
        /// Directory containing fixture JSON files.
        #[arg(long)]
        fixture: PathBuf,
        /// Output report path (markdown).
        #[arg(long)]
        report: Option<PathBuf>,
        /// Output report path (JSON).
        #[arg(long)]
        json: Option<PathBuf>,
        /// JSONL step log path.
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Print SHA-256 digests of files.
    Digest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Validate a JSONL step log.
    ValidateLog {
        #[arg(long)]
        path: PathBuf,
    },
    /// Describe a mode string or open-flag bitmask.
    Mode {
        /// fopen-style mode (`r+b`) or numeric flags (`0x241`, `577`).
        spec: String,
    },
}

fn parse_mode(spec: &str) -> chanio_core::Result<ModeDescriptor> {
    let flags = match spec.strip_prefix("0x") {
        Some(hex) => i32::from_str_radix(hex, 16).ok(),
        None => spec.parse::<i32>().ok(),
    };
    match flags {
        Some(flags) => ModeDescriptor::from_flags(flags),
        None => ModeDescriptor::parse(spec),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Verify {
            fixture,
            report,
            json,
            log,
        } => {
            eprintln!("Verifying against fixtures in {}", fixture.display());
            let mut fixture_paths: Vec<PathBuf> = std::fs::read_dir(&fixture)?
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
                .collect();
            fixture_paths.sort();

            let mut fixture_sets = Vec::new();
            let mut digests = Vec::new();
            for path in fixture_paths {
                match FixtureSet::from_file(&path) {
                    Ok(set) => {
                        digests.push(FixtureDigest {
                            path: path.display().to_string(),
                            sha256: digest::file_sha256(&path)?,
                        });
                        fixture_sets.push(set);
                    }
                    Err(err) => eprintln!("Skipping {}: {}", path.display(), err),
                }
            }
            if fixture_sets.is_empty() {
                return Err(format!("No fixture JSON files found in {}", fixture.display()).into());
            }

            let runner = TestRunner::new("fixture-verify");
            let mut emitter = match &log {
                Some(path) => Some(LogEmitter::to_file(path, "chanio", &std::process::id().to_string())?),
                None => None,
            };
            let mut results = Vec::new();
            for set in &fixture_sets {
                match emitter.as_mut() {
                    Some(emitter) => results.extend(runner.run_with_log(set, emitter)),
                    None => results.extend(runner.run(set)),
                }
            }
            if let Some(emitter) = emitter.as_mut() {
                emitter.flush()?;
            }

            let summary = VerificationSummary::from_results(results);
            let report_doc = ConformanceReport {
                title: String::from("chanio Scenario Report"),
                campaign: runner.campaign.clone(),
                timestamp: chanio_harness::structured_log::now_utc(),
                fixtures: digests,
                summary,
            };

            eprintln!(
                "Verified {} cases: {} passed, {} failed",
                report_doc.summary.total, report_doc.summary.passed, report_doc.summary.failed
            );
            for failure in report_doc.summary.failures() {
                eprintln!("FAIL {}", failure.case_name);
                if let Some(diff) = &failure.diff {
                    eprintln!("{diff}");
                }
            }

            if let Some(path) = report {
                std::fs::write(&path, report_doc.to_markdown())?;
                eprintln!("Wrote {}", path.display());
            }
            if let Some(path) = json {
                std::fs::write(&path, report_doc.to_json())?;
                eprintln!("Wrote {}", path.display());
            }
            if !report_doc.summary.all_passed() {
                return Err(format!("{} case(s) failed", report_doc.summary.failed).into());
            }
        }
        Command::Digest { paths } => {
            for path in paths {
                println!("{}  {}", digest::file_sha256(&path)?, path.display());
            }
        }
        Command::ValidateLog { path } => {
            let (lines, errors) = validate_log_file(&path)?;
            for err in &errors {
                eprintln!("{err}");
            }
            if !errors.is_empty() {
                return Err(format!("{} error(s) in {lines} line(s)", errors.len()).into());
            }
            println!("{lines} line(s) valid");
        }
        Command::Mode { spec } => {
            let mode = parse_mode(&spec)?;
            println!("mode      {mode}");
            println!("flags     {:#x}", mode.to_flags());
            println!("readable  {}", mode.is_readable());
            println!("writable  {}", mode.is_writable());
            println!("append    {}", mode.is_appendable());
            println!("truncate  {}", mode.should_truncate());
            println!("create    {}", mode.is_create());
            println!("exclusive {}", mode.is_exclusive());
            println!("binary    {}", mode.is_binary());
        }
    }

    Ok(())
}
