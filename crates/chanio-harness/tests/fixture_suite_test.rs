use std::path::{Path, PathBuf};

use chanio_harness::digest::file_sha256;
use chanio_harness::report::FixtureDigest;
use chanio_harness::verify::VerificationSummary;
use chanio_harness::{ConformanceReport, FixtureSet, TestRunner};

fn fixture_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

#[test]
fn every_shipped_fixture_passes() {
    let sets = FixtureSet::load_dir(&fixture_dir()).expect("fixture dir loads");
    assert!(sets.len() >= 2);

    let runner = TestRunner::new("suite");
    let mut results = Vec::new();
    for (_, set) in &sets {
        assert_eq!(set.version, "v1");
        assert!(!set.cases.is_empty(), "{} has no cases", set.family);
        results.extend(runner.run(set));
    }
    let summary = VerificationSummary::from_results(results);
    for failure in summary.failures() {
        eprintln!(
            "FAIL {}\n{}",
            failure.case_name,
            failure.diff.as_deref().unwrap_or_default()
        );
    }
    assert!(summary.all_passed(), "{} case(s) failed", summary.failed);
}

#[test]
fn case_names_are_unique_per_set() {
    for (path, set) in FixtureSet::load_dir(&fixture_dir()).unwrap() {
        let mut names: Vec<&str> = set.cases.iter().map(|c| c.name.as_str()).collect();
        let before = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), before, "duplicate case name in {}", path.display());
    }
}

#[test]
fn report_pins_fixture_digests() {
    let sets = FixtureSet::load_dir(&fixture_dir()).unwrap();
    let fixtures: Vec<FixtureDigest> = sets
        .iter()
        .map(|(path, _)| FixtureDigest {
            path: path.display().to_string(),
            sha256: file_sha256(path).unwrap(),
        })
        .collect();
    assert!(fixtures.iter().all(|f| f.sha256.len() == 64));

    let runner = TestRunner::new("report");
    let results = runner.run(&sets[0].1);
    let report = ConformanceReport {
        title: "chanio Scenario Report".into(),
        campaign: runner.campaign.clone(),
        timestamp: chanio_harness::structured_log::now_utc(),
        fixtures,
        summary: VerificationSummary::from_results(results),
    };
    let md = report.to_markdown();
    assert!(md.contains("## Fixtures"));
    assert!(md.contains("| Case | Property | Status |"));
    let parsed: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
    assert_eq!(parsed["campaign"], "report");
}

#[test]
fn fixture_json_survives_reserialization() {
    for (_, set) in FixtureSet::load_dir(&fixture_dir()).unwrap() {
        let again = FixtureSet::from_json(&set.to_json().unwrap()).unwrap();
        assert_eq!(again.cases.len(), set.cases.len());
        let results = TestRunner::new("reserialized").run(&again);
        assert!(results.iter().all(|r| r.passed));
    }
}
