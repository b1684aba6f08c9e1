//! Fixture execution engine.
//!
//! Each case runs in its own scratch directory against its own
//! [`DescriptorTable`]. Step outcomes and final file states are rendered as
//! one transcript line each; a case passes when the actual transcript equals
//! the expected one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use chanio_core::null::is_null_device;
use chanio_core::{
    ChannelConfig, ChannelError, DescriptorTable, LineSeparator, ModeDescriptor, ReopenPolicy,
    Whence,
};

use crate::diff;
use crate::digest::sha256_hex;
use crate::error::HarnessError;
use crate::fixtures::{CaseConfig, ExpectedFile, FixtureCase, FixtureSet, Operation, StepOutcome};
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};
use crate::verify::VerificationResult;

/// Snake-case name of an error kind, as fixtures spell it.
#[must_use]
pub fn error_kind(err: &ChannelError) -> &'static str {
    match err {
        ChannelError::InvalidModeSpec { .. } => "invalid_mode_spec",
        ChannelError::PermissionViolation { .. } => "permission_violation",
        ChannelError::NotFound { .. } => "not_found",
        ChannelError::FileExists { .. } => "file_exists",
        ChannelError::IsADirectory { .. } => "is_a_directory",
        ChannelError::Io(_) => "io",
        ChannelError::NotSeekable => "not_seekable",
        ChannelError::ClosedHandle => "closed_handle",
        ChannelError::InvalidOffset { .. } => "invalid_offset",
        ChannelError::InvalidWhence(_) => "invalid_whence",
        ChannelError::InvalidConfiguration(_) => "invalid_configuration",
        ChannelError::EndOfFile => "end_of_file",
    }
}

/// Runs fixture sets and collects verification results.
#[derive(Debug, Clone)]
pub struct TestRunner {
    /// Name of the test campaign.
    pub campaign: String,
    scratch_root: PathBuf,
}

impl TestRunner {
    /// Runner whose scratch directories live under the system temp dir.
    #[must_use]
    pub fn new(campaign: impl Into<String>) -> Self {
        Self {
            campaign: campaign.into(),
            scratch_root: std::env::temp_dir(),
        }
    }

    #[must_use]
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = root.into();
        self
    }

    /// Run all cases in a set.
    pub fn run(&self, fixture_set: &FixtureSet) -> Vec<VerificationResult> {
        fixture_set
            .cases
            .iter()
            .map(|case| self.run_case(case, None))
            .collect()
    }

    /// Run all cases, recording one log line per step and per case.
    pub fn run_with_log(
        &self,
        fixture_set: &FixtureSet,
        events: &mut LogEmitter,
    ) -> Vec<VerificationResult> {
        fixture_set
            .cases
            .iter()
            .map(|case| self.run_case(case, Some(&mut *events)))
            .collect()
    }

    fn scratch_dir(&self, case: &FixtureCase) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        self.scratch_root.join(format!(
            "chanio-{}-{}-{}-{nanos}",
            self.campaign,
            case.name,
            std::process::id()
        ))
    }

    fn run_case(&self, case: &FixtureCase, mut events: Option<&mut LogEmitter>) -> VerificationResult {
        let dir = self.scratch_dir(case);
        let expected = expected_transcript(case);
        let actual = match seed(&dir, case) {
            Ok(()) => execute_case(case, &dir, events.as_deref_mut()),
            Err(err) => format!("scratch setup failed: {err}"),
        };
        if let Err(err) = std::fs::remove_dir_all(&dir) {
            log::debug!("{}: scratch cleanup failed: {err}", dir.display());
        }

        let passed = actual == expected;
        if let Some(events) = events {
            let entry = LogEntry::new(
                "",
                if passed { LogLevel::Info } else { LogLevel::Error },
                "case_result",
            )
            .with_scenario(&case.name)
            .with_outcome(if passed { Outcome::Pass } else { Outcome::Fail });
            if let Err(err) = events.emit_entry(entry) {
                log::warn!("structured log write failed: {err}");
            }
        }

        VerificationResult {
            case_name: case.name.clone(),
            property: case.property.clone(),
            passed,
            diff: (!passed).then(|| diff::render_diff(&expected, &actual)),
            expected,
            actual,
        }
    }
}

fn seed(dir: &Path, case: &FixtureCase) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    for file in &case.setup {
        std::fs::write(dir.join(&file.path), &file.contents)?;
    }
    Ok(())
}

fn channel_config(config: &CaseConfig) -> ChannelConfig {
    let mut out = ChannelConfig::default();
    if let Some(capacity) = config.buffer_capacity {
        out.buffer_capacity = capacity.max(1);
    }
    if let Some(policy) = &config.reopen_policy {
        out.reopen_policy = ReopenPolicy::from_str_loose(policy);
    }
    if let Some(sync) = config.sync_on_write {
        out.sync_on_write = sync;
    }
    out
}

// ---------------------------------------------------------------------------
// Transcripts
// ---------------------------------------------------------------------------

fn step_line(index: usize, op: &Operation, outcome: &impl std::fmt::Display) -> String {
    format!("{index}: {} -> {outcome}", op.name())
}

fn expected_transcript(case: &FixtureCase) -> String {
    let mut lines: Vec<String> = case
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| step_line(i, &step.op, &step.expect))
        .collect();
    for file in &case.expect_files {
        lines.extend(file_lines(file, |check| match check {
            FileCheck::Contents => file.contents.clone().map(|c| quote(c.as_bytes())),
            FileCheck::Sha256 => file.sha256.clone(),
        }));
    }
    lines.join("\n")
}

fn actual_file_lines(dir: &Path, file: &ExpectedFile) -> Vec<String> {
    match std::fs::read(dir.join(&file.path)) {
        Ok(data) => file_lines(file, |check| {
            Some(match check {
                FileCheck::Contents => quote(&data),
                FileCheck::Sha256 => sha256_hex(&data),
            })
        }),
        Err(_) => vec![format!("file {}: missing", file.path)],
    }
}

enum FileCheck {
    Contents,
    Sha256,
}

fn file_lines(file: &ExpectedFile, value: impl Fn(FileCheck) -> Option<String>) -> Vec<String> {
    let mut lines = Vec::new();
    if file.contents.is_some()
        && let Some(v) = value(FileCheck::Contents)
    {
        lines.push(format!("file {}: contents {v}", file.path));
    }
    if file.sha256.is_some()
        && let Some(v) = value(FileCheck::Sha256)
    {
        lines.push(format!("file {}: sha256 {v}", file.path));
    }
    lines
}

fn quote(bytes: &[u8]) -> String {
    format!("\"{}\"", String::from_utf8_lossy(bytes).escape_debug())
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

enum StepError {
    Channel(ChannelError),
    Harness(HarnessError),
}

impl From<ChannelError> for StepError {
    fn from(err: ChannelError) -> Self {
        Self::Channel(err)
    }
}

impl From<HarnessError> for StepError {
    fn from(err: HarnessError) -> Self {
        Self::Harness(err)
    }
}

impl From<std::io::Error> for StepError {
    fn from(err: std::io::Error) -> Self {
        Self::Harness(HarnessError::Io(err))
    }
}

struct CaseState<'a> {
    table: DescriptorTable,
    handles: HashMap<String, i32>,
    dir: &'a Path,
    step: usize,
}

impl CaseState<'_> {
    fn fd(&self, handle: &str) -> Result<i32, StepError> {
        self.handles.get(handle).copied().ok_or_else(|| {
            StepError::Harness(HarnessError::UnknownHandle {
                step: self.step,
                handle: handle.to_string(),
            })
        })
    }

    fn resolve(&self, path: &str) -> PathBuf {
        if is_null_device(path) || Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.dir.join(path)
        }
    }

    /// Run `f` against the handler registered for `handle`.
    fn with_handler<T>(
        &self,
        handle: &str,
        f: impl FnOnce(&mut chanio_core::Handler) -> chanio_core::Result<T>,
    ) -> Result<T, StepError> {
        let shared = self.table.get(self.fd(handle)?)?;
        let mut handler = shared.lock();
        Ok(f(&mut *handler)?)
    }
}

fn bytes_or_eof(data: Option<Vec<u8>>) -> StepOutcome {
    data.map_or(StepOutcome::Eof, |d| {
        StepOutcome::Bytes(String::from_utf8_lossy(&d).into_owned())
    })
}

fn apply(state: &mut CaseState<'_>, op: &Operation) -> Result<StepOutcome, StepError> {
    let outcome = match op {
        Operation::Open { handle, path, mode } => {
            let mode = ModeDescriptor::parse(mode)?;
            let fd = state.table.open(state.resolve(path), mode)?;
            state.handles.insert(handle.clone(), fd);
            StepOutcome::Ok
        }
        Operation::OpenFlags {
            handle,
            path,
            flags,
        } => {
            let mode = ModeDescriptor::from_flags(*flags)?;
            let fd = state.table.open(state.resolve(path), mode)?;
            state.handles.insert(handle.clone(), fd);
            StepOutcome::Ok
        }
        Operation::Write { handle, data } => {
            let n = state.with_handler(handle, |h| h.write_block(data.as_bytes()))?;
            StepOutcome::Count(n as u64)
        }
        Operation::ReadByte { handle } => {
            bytes_or_eof(state.with_handler(handle, |h| h.read_byte())?.map(|b| vec![b]))
        }
        Operation::ReadBlock { handle, n } => {
            bytes_or_eof(state.with_handler(handle, |h| h.read_block(*n))?)
        }
        Operation::ReadLine { handle, separator } => {
            let sep = LineSeparator::from_bytes(separator.as_deref().map(str::as_bytes));
            bytes_or_eof(state.with_handler(handle, |h| h.read_line(sep))?)
        }
        Operation::ReadExactly { handle, n } => {
            bytes_or_eof(state.with_handler(handle, |h| h.read_exactly(*n))?)
        }
        Operation::ReadAll { handle } => {
            bytes_or_eof(state.with_handler(handle, |h| h.read_all())?)
        }
        Operation::ReadPartial { handle, n } => {
            bytes_or_eof(Some(state.with_handler(handle, |h| h.read_partial(*n))?))
        }
        Operation::Unget { handle, c } => {
            state.with_handler(handle, |h| {
                h.unget_char(*c);
                Ok(())
            })?;
            StepOutcome::Ok
        }
        Operation::Seek {
            handle,
            offset,
            whence,
        } => {
            let whence = Whence::from_raw(*whence)?;
            StepOutcome::Count(state.with_handler(handle, |h| h.seek(*offset, whence))?)
        }
        Operation::Rewind { handle } => {
            state.with_handler(handle, |h| h.rewind())?;
            StepOutcome::Ok
        }
        Operation::Position { handle } => {
            StepOutcome::Count(state.with_handler(handle, |h| h.current_position())?)
        }
        Operation::Eof { handle } => {
            StepOutcome::Flag(state.with_handler(handle, |h| h.is_at_end_of_file())?)
        }
        Operation::Ready { handle } => {
            StepOutcome::Count(state.with_handler(handle, |h| h.ready())? as u64)
        }
        Operation::Flush { handle } => {
            state.with_handler(handle, |h| h.flush())?;
            StepOutcome::Ok
        }
        Operation::Sync { handle } => {
            state.with_handler(handle, |h| h.sync())?;
            StepOutcome::Ok
        }
        Operation::SetSync { handle, on } => {
            state.with_handler(handle, |h| {
                h.set_sync(*on);
                Ok(())
            })?;
            StepOutcome::Ok
        }
        Operation::Truncate { handle, len } => {
            state.with_handler(handle, |h| h.truncate(*len))?;
            StepOutcome::Ok
        }
        Operation::Reset { handle, mode } => {
            let subset = ModeDescriptor::parse(mode)?;
            state.with_handler(handle, |h| h.reset(subset))?;
            StepOutcome::Ok
        }
        Operation::Clone { handle, into } => {
            let fd = state.table.clone_descriptor(state.fd(handle)?)?;
            state.handles.insert(into.clone(), fd);
            StepOutcome::Ok
        }
        Operation::Reopen { handle, path, mode } => {
            let mode = ModeDescriptor::parse(mode)?;
            let fd = state.fd(handle)?;
            state.table.reopen(fd, state.resolve(path), mode)?;
            StepOutcome::Ok
        }
        Operation::CloseWrite { handle } => {
            state.with_handler(handle, |h| h.close_write())?;
            StepOutcome::Ok
        }
        // The alias stays mapped, so later steps on it see a closed handle.
        Operation::Close { handle } => {
            state.table.close(state.fd(handle)?)?;
            StepOutcome::Ok
        }
        Operation::ExternalReplace { path, data } => {
            let target = state.resolve(path);
            let staging = state.dir.join(format!(".{}.staging", state.step));
            std::fs::write(&staging, data)?;
            std::fs::rename(&staging, &target)?;
            StepOutcome::Ok
        }
    };
    Ok(outcome)
}

fn execute_case(case: &FixtureCase, dir: &Path, mut events: Option<&mut LogEmitter>) -> String {
    let mut state = CaseState {
        table: DescriptorTable::with_config(channel_config(&case.config)),
        handles: HashMap::new(),
        dir,
        step: 0,
    };
    let mut lines = Vec::with_capacity(case.steps.len() + case.expect_files.len());

    for (index, step) in case.steps.iter().enumerate() {
        state.step = index;
        let started = Instant::now();
        let result = apply(&mut state, &step.op);
        let latency_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);

        let (outcome, errno) = match result {
            Ok(outcome) => (outcome, None),
            Err(StepError::Channel(err)) => {
                (StepOutcome::Error(error_kind(&err).to_string()), Some(err.errno()))
            }
            Err(StepError::Harness(err)) => {
                lines.push(step_line(index, &step.op, &format!("harness error: {err}")));
                break;
            }
        };

        if let Some(events) = events.as_deref_mut() {
            let passed = outcome == step.expect;
            let mut entry = LogEntry::new("", LogLevel::Debug, "step")
                .with_scenario(&case.name)
                .with_step(index, step.op.name())
                .with_outcome(if passed { Outcome::Pass } else { Outcome::Fail })
                .with_latency_ns(latency_ns)
                .with_details(serde_json::json!({ "actual": outcome.to_string() }));
            if let Some(fd) = step.op.handle().and_then(|h| state.handles.get(h)) {
                entry = entry.with_fd(*fd);
            }
            if let Some(errno) = errno {
                entry = entry.with_errno(errno);
            }
            if let Err(err) = events.emit_entry(entry) {
                log::warn!("structured log write failed: {err}");
            }
        }
        lines.push(step_line(index, &step.op, &outcome));
    }

    // Dropping the table flushes whatever the steps left buffered.
    drop(state);
    for file in &case.expect_files {
        lines.extend(actual_file_lines(dir, file));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(json: &str) -> FixtureSet {
        FixtureSet::from_json(json).expect("valid fixture json")
    }

    #[test]
    fn passing_case_round_trips_through_a_file() {
        let fixture = set(r#"{
            "version": "v1",
            "family": "smoke",
            "cases": [{
                "name": "write_then_read",
                "property": "bytes written are read back",
                "config": {"buffer_capacity": 4},
                "steps": [
                    {"op": "open", "handle": "f", "path": "data.txt", "mode": "w+", "expect": "ok"},
                    {"op": "write", "handle": "f", "data": "hello world", "expect": {"count": 11}},
                    {"op": "position", "handle": "f", "expect": {"count": 11}},
                    {"op": "rewind", "handle": "f", "expect": "ok"},
                    {"op": "read_block", "handle": "f", "n": 5, "expect": {"bytes": "hello"}},
                    {"op": "close", "handle": "f", "expect": "ok"},
                    {"op": "close", "handle": "f", "expect": {"error": "closed_handle"}}
                ],
                "expect_files": [{"path": "data.txt", "contents": "hello world"}]
            }]
        }"#);
        let results = TestRunner::new("unit").run(&fixture);
        assert_eq!(results.len(), 1);
        assert!(results[0].passed, "{:?}", results[0].diff);
        assert!(results[0].diff.is_none());
    }

    #[test]
    fn mismatch_produces_diff() {
        let fixture = set(r#"{
            "version": "v1",
            "family": "smoke",
            "cases": [{
                "name": "wrong_expectation",
                "property": "reads from an empty file hit eof",
                "setup": [{"path": "empty", "contents": ""}],
                "steps": [
                    {"op": "open", "handle": "f", "path": "empty", "mode": "r", "expect": "ok"},
                    {"op": "read_byte", "handle": "f", "expect": {"bytes": "x"}}
                ]
            }]
        }"#);
        let results = TestRunner::new("unit").run(&fixture);
        assert!(!results[0].passed);
        let diff = results[0].diff.as_deref().unwrap();
        assert!(diff.contains("-1: read_byte -> bytes \"x\""));
        assert!(diff.contains("+1: read_byte -> eof"));
    }

    #[test]
    fn unknown_handle_stops_the_case() {
        let fixture = set(r#"{
            "version": "v1",
            "family": "smoke",
            "cases": [{
                "name": "typo",
                "property": "harness rejects unknown aliases",
                "steps": [
                    {"op": "flush", "handle": "nope", "expect": "ok"},
                    {"op": "flush", "handle": "nope", "expect": "ok"}
                ]
            }]
        }"#);
        let results = TestRunner::new("unit").run(&fixture);
        assert!(!results[0].passed);
        assert!(results[0].actual.contains("harness error"));
        assert_eq!(results[0].actual.lines().count(), 1);
    }

    #[test]
    fn logged_run_emits_step_and_case_lines() {
        let fixture = set(r#"{
            "version": "v1",
            "family": "smoke",
            "cases": [{
                "name": "null_sink",
                "property": "null device swallows writes",
                "steps": [
                    {"op": "open", "handle": "n", "path": "/dev/null", "mode": "r+", "expect": "ok"},
                    {"op": "write", "handle": "n", "data": "gone", "expect": {"count": 4}},
                    {"op": "read_byte", "handle": "n", "expect": "eof"}
                ]
            }]
        }"#);
        let path = std::env::temp_dir().join(format!(
            "chanio-runner-log-{}-{}.jsonl",
            std::process::id(),
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos()
        ));
        let mut log = LogEmitter::to_file(&path, "chanio", "unit").unwrap();
        let results = TestRunner::new("unit").run_with_log(&fixture, &mut log);
        log.flush().unwrap();
        drop(log);
        assert!(results[0].passed, "{:?}", results[0].diff);

        let (lines, errors) = crate::structured_log::validate_log_file(&path).unwrap();
        assert_eq!(lines, 4);
        assert!(errors.is_empty(), "{errors:?}");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn error_kinds_are_snake_case() {
        assert_eq!(error_kind(&ChannelError::NotSeekable), "not_seekable");
        assert_eq!(
            error_kind(&ChannelError::InvalidOffset { offset: -1 }),
            "invalid_offset"
        );
    }
}
