//! Scenario fixtures: scripted operation sequences with expected outcomes.
//!
//! Each case seeds a scratch directory with files, runs its steps against a
//! fresh descriptor table, and compares every step's outcome plus the final
//! file contents against the fixture.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

/// Outcome of one step, compared structurally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Ok,
    Eof,
    Bytes(String),
    Count(u64),
    Flag(bool),
    /// Error kind in snake case, e.g. `closed_handle`.
    Error(String),
}

fn default_separator() -> Option<String> {
    Some("\n".to_string())
}

/// One scripted operation. Handles are fixture-local aliases for
/// descriptor numbers; paths are relative to the case's scratch directory
/// (null device names pass through).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Open {
        handle: String,
        path: String,
        mode: String,
    },
    OpenFlags {
        handle: String,
        path: String,
        flags: i32,
    },
    Write {
        handle: String,
        data: String,
    },
    ReadByte {
        handle: String,
    },
    ReadBlock {
        handle: String,
        n: usize,
    },
    /// Omitted separator means `"\n"`; `null` reads the whole stream; `""`
    /// selects paragraph mode.
    ReadLine {
        handle: String,
        #[serde(default = "default_separator")]
        separator: Option<String>,
    },
    ReadExactly {
        handle: String,
        n: usize,
    },
    ReadAll {
        handle: String,
    },
    ReadPartial {
        handle: String,
        n: usize,
    },
    Unget {
        handle: String,
        c: i32,
    },
    Seek {
        handle: String,
        offset: i64,
        whence: i32,
    },
    Rewind {
        handle: String,
    },
    Position {
        handle: String,
    },
    Eof {
        handle: String,
    },
    Ready {
        handle: String,
    },
    Flush {
        handle: String,
    },
    Sync {
        handle: String,
    },
    SetSync {
        handle: String,
        on: bool,
    },
    Truncate {
        handle: String,
        len: u64,
    },
    Reset {
        handle: String,
        mode: String,
    },
    Clone {
        handle: String,
        into: String,
    },
    Reopen {
        handle: String,
        path: String,
        mode: String,
    },
    CloseWrite {
        handle: String,
    },
    Close {
        handle: String,
    },
    /// Replace a file behind the channels' backs (write-then-rename).
    ExternalReplace {
        path: String,
        data: String,
    },
}

impl Operation {
    /// Snake-case operation name, as written in fixtures.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::OpenFlags { .. } => "open_flags",
            Self::Write { .. } => "write",
            Self::ReadByte { .. } => "read_byte",
            Self::ReadBlock { .. } => "read_block",
            Self::ReadLine { .. } => "read_line",
            Self::ReadExactly { .. } => "read_exactly",
            Self::ReadAll { .. } => "read_all",
            Self::ReadPartial { .. } => "read_partial",
            Self::Unget { .. } => "unget",
            Self::Seek { .. } => "seek",
            Self::Rewind { .. } => "rewind",
            Self::Position { .. } => "position",
            Self::Eof { .. } => "eof",
            Self::Ready { .. } => "ready",
            Self::Flush { .. } => "flush",
            Self::Sync { .. } => "sync",
            Self::SetSync { .. } => "set_sync",
            Self::Truncate { .. } => "truncate",
            Self::Reset { .. } => "reset",
            Self::Clone { .. } => "clone",
            Self::Reopen { .. } => "reopen",
            Self::CloseWrite { .. } => "close_write",
            Self::Close { .. } => "close",
            Self::ExternalReplace { .. } => "external_replace",
        }
    }

    /// The handle alias the step acts on, if any.
    #[must_use]
    pub fn handle(&self) -> Option<&str> {
        match self {
            Self::Open { handle, .. }
            | Self::OpenFlags { handle, .. }
            | Self::Write { handle, .. }
            | Self::ReadByte { handle }
            | Self::ReadBlock { handle, .. }
            | Self::ReadLine { handle, .. }
            | Self::ReadExactly { handle, .. }
            | Self::ReadAll { handle }
            | Self::ReadPartial { handle, .. }
            | Self::Unget { handle, .. }
            | Self::Seek { handle, .. }
            | Self::Rewind { handle }
            | Self::Position { handle }
            | Self::Eof { handle }
            | Self::Ready { handle }
            | Self::Flush { handle }
            | Self::Sync { handle }
            | Self::SetSync { handle, .. }
            | Self::Truncate { handle, .. }
            | Self::Reset { handle, .. }
            | Self::Clone { handle, .. }
            | Self::Reopen { handle, .. }
            | Self::CloseWrite { handle }
            | Self::Close { handle } => Some(handle),
            Self::ExternalReplace { .. } => None,
        }
    }
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Eof => f.write_str("eof"),
            Self::Bytes(s) => write!(f, "bytes \"{}\"", s.escape_debug()),
            Self::Count(n) => write!(f, "count {n}"),
            Self::Flag(b) => write!(f, "flag {b}"),
            Self::Error(kind) => write!(f, "error {kind}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub op: Operation,
    pub expect: StepOutcome,
}

/// File seeded into the scratch directory before the steps run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedFile {
    pub path: String,
    pub contents: String,
}

/// Final-state check on a scratch file: exact contents, a SHA-256, or both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedFile {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Channel settings for a case; unset fields use library defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseConfig {
    #[serde(default)]
    pub buffer_capacity: Option<usize>,
    #[serde(default)]
    pub reopen_policy: Option<String>,
    #[serde(default)]
    pub sync_on_write: Option<bool>,
}

/// A single fixture case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureCase {
    /// Case identifier.
    pub name: String,
    /// Behavior under test, in words.
    pub property: String,
    #[serde(default)]
    pub config: CaseConfig,
    #[serde(default)]
    pub setup: Vec<SeedFile>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub expect_files: Vec<ExpectedFile>,
}

/// A collection of fixture cases for one area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSet {
    /// Schema version.
    pub version: String,
    /// Area name (e.g. `seekable`, `lines`).
    pub family: String,
    pub cases: Vec<FixtureCase>,
}

impl FixtureSet {
    /// Load fixture set from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize fixture set to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load fixture set from a file path.
    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }

    /// Load every `*.json` set in `dir`, sorted by file name.
    pub fn load_dir(dir: &Path) -> Result<Vec<(std::path::PathBuf, Self)>, HarnessError> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect();
        paths.sort();
        if paths.is_empty() {
            return Err(HarnessError::NoFixtures(dir.display().to_string()));
        }
        paths
            .into_iter()
            .map(|path| Self::from_file(&path).map(|set| (path, set)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_steps_with_flattened_ops() {
        let set = FixtureSet::from_json(
            r#"{
                "version": "v1",
                "family": "smoke",
                "cases": [{
                    "name": "one",
                    "property": "open then read",
                    "setup": [{"path": "a.txt", "contents": "hi"}],
                    "steps": [
                        {"op": "open", "handle": "h", "path": "a.txt", "mode": "r", "expect": "ok"},
                        {"op": "read_line", "handle": "h", "expect": {"bytes": "hi"}},
                        {"op": "read_line", "handle": "h", "separator": null, "expect": "eof"},
                        {"op": "seek", "handle": "h", "offset": -1, "whence": 0, "expect": {"error": "invalid_offset"}}
                    ]
                }]
            }"#,
        )
        .unwrap();
        let case = &set.cases[0];
        assert_eq!(case.steps.len(), 4);
        assert!(matches!(
            &case.steps[1].op,
            Operation::ReadLine { separator: Some(s), .. } if s == "\n"
        ));
        assert!(matches!(
            &case.steps[2].op,
            Operation::ReadLine { separator: None, .. }
        ));
        assert_eq!(case.steps[2].expect, StepOutcome::Eof);
        assert_eq!(
            case.steps[3].expect,
            StepOutcome::Error("invalid_offset".into())
        );
        assert_eq!(case.steps[3].op.name(), "seek");
        assert_eq!(case.steps[3].op.handle(), Some("h"));
    }

    #[test]
    fn outcomes_render_one_line_each() {
        assert_eq!(StepOutcome::Ok.to_string(), "ok");
        assert_eq!(
            StepOutcome::Bytes("a\nb".into()).to_string(),
            "bytes \"a\\nb\""
        );
        assert_eq!(StepOutcome::Count(7).to_string(), "count 7");
        assert_eq!(
            StepOutcome::Error("closed_handle".into()).to_string(),
            "error closed_handle"
        );
    }

    #[test]
    fn missing_dir_is_an_error() {
        let dir = std::env::temp_dir().join(format!("chanio-nofixtures-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        assert!(matches!(
            FixtureSet::load_dir(&dir),
            Err(HarnessError::NoFixtures(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
