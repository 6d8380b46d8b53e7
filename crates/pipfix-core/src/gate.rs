//! Confirmation and execution gate.
//!
//! Drives each [`SafeCommand`] through the per-command state machine
//! `Proposed -> {Confirmed | Declined} -> {Succeeded | Failed}`:
//! consent comes from the auto-confirm setting or a [`Confirmer`],
//! execution goes through the [`CommandRunner`]. All commands are
//! processed in order even after failures; the aggregate [`FixOutcome`]
//! is returned at the end.
//!
//! The gate only accepts `SafeCommand` values, so an unfiltered
//! candidate cannot reach execution by construction.

use async_trait::async_trait;
use serde::Serialize;

use crate::filter::SafeCommand;
use crate::runner::{CommandRunner, ExecutionResult, DEFAULT_CHILD_TIMEOUT};

/// Outcome of asking for consent on one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmDecision {
    /// Explicit affirmative answer.
    Confirmed,
    /// Explicit negative (or any non-affirmative) answer.
    Declined,
    /// End-of-input on the prompt. Treated like a decline: the gate
    /// fails toward safety, never toward execution.
    InputClosed,
}

/// Progress events reported back through the confirmer so an
/// interactive session sees results as they happen.
#[derive(Debug)]
pub enum GateEvent<'a> {
    /// A safe command is about to be offered for confirmation.
    Proposed { command: &'a str },
    /// Consent granted; the command is about to run.
    Executing { command: &'a str },
    /// Consent withheld; the command will not run.
    Skipped { command: &'a str },
    /// The command ran to completion (successfully or not).
    Finished {
        command: &'a str,
        result: &'a ExecutionResult,
    },
}

/// Source of consent for proposed commands.
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// Ask whether `command` may be executed.
    async fn confirm(&self, command: &str) -> ConfirmDecision;

    /// Observe gate progress. Default implementation ignores events.
    async fn notify(&self, _event: GateEvent<'_>) {}
}

/// Final state of one command in the gate's state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Disposition {
    Declined,
    InputClosed,
    Succeeded,
    Failed { exit_code: i32 },
}

/// Per-command record in the aggregate outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub disposition: Disposition,
}

/// Aggregate result of running zero or more safe commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct FixOutcome {
    /// True iff at least one command exited 0.
    pub applied: bool,
    /// Package specifiers recorded from successful installs, in order.
    pub installed_specifiers: Vec<String>,
    /// One entry per safe command, in order.
    pub reports: Vec<CommandReport>,
}

/// The confirmation & execution gate.
pub struct FixGate<'a> {
    runner: &'a dyn CommandRunner,
    confirmer: &'a dyn Confirmer,
    auto_confirm: bool,
}

impl<'a> FixGate<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        confirmer: &'a dyn Confirmer,
        auto_confirm: bool,
    ) -> Self {
        Self {
            runner,
            confirmer,
            auto_confirm,
        }
    }

    /// Process every safe command in order and return the aggregate
    /// outcome. A failing command never aborts the remainder.
    pub async fn apply(&self, commands: &[SafeCommand]) -> FixOutcome {
        let mut outcome = FixOutcome::default();

        for command in commands {
            let line = command.line();
            tracing::info!(command = %line, "proposing fix command");
            self.confirmer
                .notify(GateEvent::Proposed { command: line })
                .await;

            let decision = if self.auto_confirm {
                ConfirmDecision::Confirmed
            } else {
                self.confirmer.confirm(line).await
            };

            let disposition = match decision {
                ConfirmDecision::Declined => {
                    tracing::debug!(command = %line, "user declined execution");
                    self.confirmer
                        .notify(GateEvent::Skipped { command: line })
                        .await;
                    Disposition::Declined
                }
                ConfirmDecision::InputClosed => {
                    tracing::warn!(command = %line, "input stream closed, skipping execution");
                    self.confirmer
                        .notify(GateEvent::Skipped { command: line })
                        .await;
                    Disposition::InputClosed
                }
                ConfirmDecision::Confirmed => {
                    self.confirmer
                        .notify(GateEvent::Executing { command: line })
                        .await;
                    let result = self.runner.run(command.tokens(), DEFAULT_CHILD_TIMEOUT).await;
                    self.confirmer
                        .notify(GateEvent::Finished {
                            command: line,
                            result: &result,
                        })
                        .await;

                    if result.succeeded() {
                        outcome.applied = true;
                        if let Some(spec) = installed_specifier(command.tokens()) {
                            tracing::debug!(specifier = %spec, "recorded installed specifier");
                            outcome.installed_specifiers.push(spec.to_string());
                        }
                        Disposition::Succeeded
                    } else {
                        tracing::error!(
                            command = %line,
                            exit_code = result.exit_code,
                            "fix command failed"
                        );
                        Disposition::Failed {
                            exit_code: result.exit_code,
                        }
                    }
                }
            };

            outcome.reports.push(CommandReport {
                command: line.to_string(),
                disposition,
            });
        }

        outcome
    }
}

/// Best-effort specifier heuristic: the token immediately following an
/// `install` token, when it does not look like a flag. Complex pip
/// argument grammars (multiple packages, options between subcommand and
/// package) are deliberately not parsed.
fn installed_specifier(tokens: &[String]) -> Option<&str> {
    let idx = tokens.iter().position(|t| t == "install")?;
    let next = tokens.get(idx + 1)?;
    if next.starts_with('-') {
        None
    } else {
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::extract::CandidateCommand;
    use crate::filter::filter_candidates;

    /// Runner that answers from a script of (command line -> exit code)
    /// and records what it was asked to run.
    struct ScriptedRunner {
        exit_codes: HashMap<String, i32>,
        invocations: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn new(script: &[(&str, i32)]) -> Self {
            Self {
                exit_codes: script
                    .iter()
                    .map(|(cmd, code)| (cmd.to_string(), *code))
                    .collect(),
                invocations: Mutex::new(Vec::new()),
            }
        }

        fn invocations(&self) -> Vec<String> {
            self.invocations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, argv: &[String], _timeout: Duration) -> ExecutionResult {
            let line = argv.join(" ");
            let exit_code = *self.exit_codes.get(&line).unwrap_or(&0);
            self.invocations.lock().unwrap().push(line);
            ExecutionResult {
                exit_code,
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: 1,
            }
        }
    }

    /// Confirmer that replays a fixed sequence of decisions.
    struct ScriptedConfirmer {
        decisions: Mutex<Vec<ConfirmDecision>>,
    }

    impl ScriptedConfirmer {
        fn new(decisions: Vec<ConfirmDecision>) -> Self {
            Self {
                decisions: Mutex::new(decisions),
            }
        }
    }

    #[async_trait]
    impl Confirmer for ScriptedConfirmer {
        async fn confirm(&self, _command: &str) -> ConfirmDecision {
            let mut decisions = self.decisions.lock().unwrap();
            if decisions.is_empty() {
                ConfirmDecision::InputClosed
            } else {
                decisions.remove(0)
            }
        }
    }

    fn safe(lines: &[&str]) -> Vec<SafeCommand> {
        let candidates: Vec<CandidateCommand> =
            lines.iter().map(|l| CandidateCommand::from(*l)).collect();
        let report = filter_candidates(&candidates, None);
        assert_eq!(report.safe.len(), lines.len(), "fixture must be safe");
        report.safe
    }

    #[tokio::test]
    async fn test_auto_confirm_runs_all_and_records_specifiers() {
        let runner = ScriptedRunner::new(&[]);
        let confirmer = ScriptedConfirmer::new(vec![]);
        let gate = FixGate::new(&runner, &confirmer, true);

        let outcome = gate
            .apply(&safe(&["pip install requests", "pip install numpy"]))
            .await;

        assert!(outcome.applied);
        assert_eq!(outcome.installed_specifiers, vec!["requests", "numpy"]);
        assert_eq!(runner.invocations().len(), 2);
        assert!(outcome
            .reports
            .iter()
            .all(|r| r.disposition == Disposition::Succeeded));
    }

    #[tokio::test]
    async fn test_declined_command_never_reaches_runner() {
        let runner = ScriptedRunner::new(&[]);
        let confirmer = ScriptedConfirmer::new(vec![ConfirmDecision::Declined]);
        let gate = FixGate::new(&runner, &confirmer, false);

        let outcome = gate.apply(&safe(&["pip install requests"])).await;

        assert!(!outcome.applied);
        assert!(runner.invocations().is_empty());
        assert_eq!(outcome.reports[0].disposition, Disposition::Declined);
    }

    #[tokio::test]
    async fn test_input_closed_treated_as_decline() {
        let runner = ScriptedRunner::new(&[]);
        let confirmer = ScriptedConfirmer::new(vec![]);
        let gate = FixGate::new(&runner, &confirmer, false);

        let outcome = gate.apply(&safe(&["pip install requests"])).await;

        assert!(!outcome.applied);
        assert!(runner.invocations().is_empty());
        assert_eq!(outcome.reports[0].disposition, Disposition::InputClosed);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_commands() {
        let runner = ScriptedRunner::new(&[("pip install broken", 1)]);
        let confirmer = ScriptedConfirmer::new(vec![]);
        let gate = FixGate::new(&runner, &confirmer, true);

        let outcome = gate
            .apply(&safe(&["pip install broken", "pip install requests"]))
            .await;

        assert!(outcome.applied);
        assert_eq!(runner.invocations().len(), 2);
        assert_eq!(
            outcome.reports[0].disposition,
            Disposition::Failed { exit_code: 1 }
        );
        assert_eq!(outcome.reports[1].disposition, Disposition::Succeeded);
        assert_eq!(outcome.installed_specifiers, vec!["requests"]);
    }

    #[tokio::test]
    async fn test_all_failures_means_not_applied() {
        let runner = ScriptedRunner::new(&[("pip install broken", 2)]);
        let confirmer = ScriptedConfirmer::new(vec![]);
        let gate = FixGate::new(&runner, &confirmer, true);

        let outcome = gate.apply(&safe(&["pip install broken"])).await;
        assert!(!outcome.applied);
        assert!(outcome.installed_specifiers.is_empty());
    }

    #[tokio::test]
    async fn test_mixed_decisions_execute_only_confirmed() {
        let runner = ScriptedRunner::new(&[]);
        let confirmer = ScriptedConfirmer::new(vec![
            ConfirmDecision::Declined,
            ConfirmDecision::Confirmed,
        ]);
        let gate = FixGate::new(&runner, &confirmer, false);

        let outcome = gate
            .apply(&safe(&["pip install one", "pip install two"]))
            .await;

        assert_eq!(runner.invocations(), vec!["pip install two"]);
        assert_eq!(outcome.installed_specifiers, vec!["two"]);
    }

    #[test]
    fn test_specifier_heuristic_skips_flag_token() {
        let tokens: Vec<String> = ["pip", "install", "-q", "package"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(installed_specifier(&tokens), None);
    }

    #[test]
    fn test_specifier_heuristic_requires_install_token() {
        let tokens: Vec<String> = ["pip", "uninstall", "package"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(installed_specifier(&tokens), None);
    }

    #[test]
    fn test_specifier_heuristic_takes_single_following_token() {
        let tokens: Vec<String> = ["pip", "install", "numpy", "scipy"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(installed_specifier(&tokens), Some("numpy"));
    }
}
