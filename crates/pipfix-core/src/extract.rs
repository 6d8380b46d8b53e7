//! Extraction of candidate commands from advisory text.
//!
//! The advisory service answers in free-form markdown; by convention the
//! runnable fix lives in triple-backtick fenced blocks. This module pulls
//! those lines out verbatim. No shell interpretation happens here — that
//! is the safety filter's job.

/// One line lifted from a fenced block. Not yet validated against the
/// safety rules and therefore not executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateCommand(String);

impl CandidateCommand {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CandidateCommand {
    fn from(line: &str) -> Self {
        Self(line.to_string())
    }
}

/// Scan `text` line by line, toggling fence state on lines that start
/// with ```` ``` ````. Every non-blank, non-fence line inside a fence
/// becomes one whitespace-trimmed candidate, in encounter order.
pub fn extract_candidates(text: &str) -> Vec<CandidateCommand> {
    let mut candidates = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        if line.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                candidates.push(CandidateCommand(trimmed.to_string()));
            }
        }
    }

    tracing::debug!(count = candidates.len(), "extracted candidate commands");
    candidates
}
