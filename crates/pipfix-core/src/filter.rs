//! Safety filtering of candidate commands.
//!
//! The advisory text is adversarial by construction: the service (or
//! anything impersonating it) can emit arbitrary shell. Two independent,
//! mandatory checks stand between that text and execution:
//!
//! - a **blocklist** of disallowed substrings, rejecting a line outright
//!   when any fragment appears (case-sensitive),
//! - an **allowlist** of anchored command shapes a line must match
//!   (case-insensitive).
//!
//! Neither check alone is sufficient: the blocklist backstops encoding
//! tricks inside an allowed prefix, and the allowlist stops everything
//! that is not a pip invocation to begin with. A context-specific third
//! rule suppresses re-running the very requirements file that just
//! failed.
//!
//! Only this module can mint a [`SafeCommand`]; the execution gate
//! accepts nothing else.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::extract::CandidateCommand;

/// Literal fragments whose presence disqualifies a candidate outright.
pub const DISALLOWED_SUBSTRINGS: [&str; 9] =
    ["sudo", "rm ", "mv ", "dd ", "|", ";", "&&", ">", "<"];

/// The three command shapes eligible for execution, anchored at the
/// start and matched case-insensitively.
const ALLOWED_PATTERNS: [&str; 3] = [
    r"(?i)^pip\s+install($|\s+.*)",
    r"(?i)^pip\s+uninstall($|\s+.*)",
    r"(?i)^python\s+-m\s+pip\s+install($|\s+.*)",
];

fn allowed_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        ALLOWED_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("hard-coded allowlist pattern compiles"))
            .collect()
    })
}

/// Patterns matching a re-install of the original requirements file,
/// allowing interleaved single-dash flag tokens before `-r`.
fn replay_patterns(filename: &str) -> Vec<Regex> {
    let escaped = regex::escape(filename);
    [
        format!(r"(?i)^pip\s+install\s+(-[a-zA-Z]+\s+)*-r\s+{escaped}(\s+.*)?$"),
        format!(r"(?i)^python\s+-m\s+pip\s+install\s+(-[a-zA-Z]+\s+)*-r\s+{escaped}(\s+.*)?$"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("escaped replay pattern compiles"))
    .collect()
}

/// A candidate that has passed tokenization, the blocklist, the
/// allowlist, and the requirements-replay check. The only type the
/// execution gate accepts. Fields are private so the filter is the sole
/// constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafeCommand {
    line: String,
    tokens: Vec<String>,
}

impl SafeCommand {
    /// The original command line as suggested.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Shell-word tokens, ready for the command runner.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

impl fmt::Display for SafeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

/// Why a candidate was dropped. Recovered locally — a rejection never
/// aborts the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// Shell tokenization failed (unbalanced quoting).
    Tokenize { line: String },
    /// The raw text contains one or more disallowed substrings.
    DisallowedSubstrings { line: String, found: Vec<String> },
    /// The raw text matches none of the allowed command shapes.
    NoAllowedPattern { line: String },
    /// The command re-runs the requirements file that just failed.
    RequirementsReplay { line: String },
}

impl Rejection {
    /// The rejected command line.
    pub fn line(&self) -> &str {
        match self {
            Rejection::Tokenize { line }
            | Rejection::DisallowedSubstrings { line, .. }
            | Rejection::NoAllowedPattern { line }
            | Rejection::RequirementsReplay { line } => line,
        }
    }
}

/// Outcome of one filtering pass: the safe commands in original order
/// plus one typed rejection per dropped candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct FilterReport {
    pub safe: Vec<SafeCommand>,
    pub rejections: Vec<Rejection>,
}

impl FilterReport {
    /// Whether any candidate survived. An empty safe list is a
    /// distinguished outcome, not an error.
    pub fn has_safe_commands(&self) -> bool {
        !self.safe.is_empty()
    }
}

/// Filter `candidates` in order, applying every check to every line.
///
/// `original_requirements_file` is the filename from a failed
/// `-r <file>` install, when there was one; it activates the replay
/// suppression. Duplicates are preserved — the filter is stateless per
/// candidate, so the same input always yields the same report.
pub fn filter_candidates(
    candidates: &[CandidateCommand],
    original_requirements_file: Option<&str>,
) -> FilterReport {
    let replay = original_requirements_file.map(replay_patterns);
    let mut report = FilterReport::default();

    for candidate in candidates {
        let line = candidate.as_str();
        tracing::debug!(command = %line, "checking candidate");

        let Some(tokens) = shlex::split(line) else {
            tracing::warn!(command = %line, "failed to tokenize candidate, dropping");
            report.rejections.push(Rejection::Tokenize {
                line: line.to_string(),
            });
            continue;
        };

        let found: Vec<String> = DISALLOWED_SUBSTRINGS
            .iter()
            .filter(|sub| line.contains(*sub))
            .map(|sub| sub.to_string())
            .collect();
        if !found.is_empty() {
            tracing::warn!(command = %line, ?found, "candidate contains disallowed substrings");
            report.rejections.push(Rejection::DisallowedSubstrings {
                line: line.to_string(),
                found,
            });
            continue;
        }

        if !allowed_patterns().iter().any(|p| p.is_match(line)) {
            tracing::warn!(command = %line, "candidate matches no allowed pattern");
            report.rejections.push(Rejection::NoAllowedPattern {
                line: line.to_string(),
            });
            continue;
        }

        if let Some(patterns) = &replay {
            if patterns.iter().any(|p| p.is_match(line)) {
                tracing::info!(command = %line, "candidate re-runs the original requirements file");
                report.rejections.push(Rejection::RequirementsReplay {
                    line: line.to_string(),
                });
                continue;
            }
        }

        tracing::info!(command = %line, "candidate accepted as safe");
        report.safe.push(SafeCommand {
            line: line.to_string(),
            tokens,
        });
    }

    if !report.has_safe_commands() {
        tracing::warn!("no safe commands found among candidates");
    }
    report
}
