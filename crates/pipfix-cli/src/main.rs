//! pipfix - advisory-assisted repair for failed pip installs.
//!
//! `pipfix install <pip args...>` runs the install; on failure it sends
//! the captured output to the advisory service, filters the suggested
//! commands for safety, and executes approved ones with confirmation.
//!
//! Exit status: 0 on success (including a repaired failure), the child's
//! own exit code on an unrecovered failure, 2 on usage errors, 130 on
//! interrupt, 1 on unexpected internal errors.

use std::io::Write as _;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;

use pipfix_core::{
    detect_requirements_file, extract_candidates, filter_candidates, init_tracing, resolve_locale,
    system_locale, write_fixed_file, AdvisoryClient, AdvisoryError, CommandRunner, ConfigFile,
    ConfirmDecision, Confirmer, EnvSettings, ErrorContext, FixGate, GateEvent, Locale, Message,
    ProcessRunner, Rejection, SettingOverrides, Settings, DEFAULT_CHILD_TIMEOUT,
};

#[derive(Parser)]
#[command(name = "pipfix")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Advisory-assisted repair for failed pip installs", long_about = None)]
struct Cli {
    /// Advisory server URL
    #[arg(long, global = true)]
    server_url: Option<String>,

    /// Automatically confirm suggested fix commands
    #[arg(long, global = true)]
    auto_confirm: bool,

    /// Advisory request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<i64>,

    /// Maximum advisory request retries
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Display language (en or zh)
    #[arg(long, global = true)]
    lang: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run `pip install` and repair it on failure
    Install {
        /// Arguments passed to pip verbatim
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        pip_args: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[pipfix Error] An unexpected error occurred: {err:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<i32> {
    let overrides = SettingOverrides {
        server_url: cli.server_url.clone(),
        auto_confirm: cli.auto_confirm.then_some(true),
        timeout_secs: cli.timeout,
        max_retries: cli.max_retries,
        lang: cli.lang.clone(),
    };
    let settings = Settings::resolve(
        &overrides,
        &EnvSettings::from_process(),
        &ConfigFile::load_default_chain(),
    );
    let locale = resolve_locale(settings.lang.as_deref(), system_locale().as_deref());
    tracing::debug!(?settings, %locale, "resolved settings");

    match cli.command {
        Commands::Install { pip_args } => {
            // Race the pipeline against Ctrl-C. Children are spawned
            // with kill-on-drop, so abandoning the pipeline future also
            // terminates an in-flight command.
            tokio::select! {
                code = cmd_install(&settings, locale, &pip_args) => code,
                _ = tokio::signal::ctrl_c() => {
                    println!("\n{}", Message::Interrupted.render(locale));
                    Ok(130)
                }
            }
        }
    }
}

async fn cmd_install(settings: &Settings, locale: Locale, pip_args: &[String]) -> Result<i32> {
    if pip_args.is_empty() {
        println!("{}", Message::MissingPackageName.render(locale));
        println!("{}", Message::Usage.render(locale));
        return Ok(2);
    }

    let mut argv = vec!["pip".to_string(), "install".to_string()];
    argv.extend(pip_args.iter().cloned());
    let command_line = argv.join(" ");

    println!(
        "{}",
        Message::Running {
            command: &command_line
        }
        .render(locale)
    );

    let runner = ProcessRunner;
    let result = runner.run(&argv, DEFAULT_CHILD_TIMEOUT).await;

    if result.succeeded() {
        println!("{}", Message::InstallSuccess.render(locale));
        return Ok(0);
    }

    println!("{}", Message::InstallFail.render(locale));
    let ctx = ErrorContext::new(&command_line, result.exit_code, &result.stdout, &result.stderr);
    println!("{ctx}");

    println!("{}", Message::AttemptingFix.render(locale));
    let Some(suggestion) = fetch_suggestion(settings, locale, &ctx).await else {
        println!("{}", Message::NoSuggestion.render(locale));
        return Ok(result.exit_code);
    };
    println!("{}", Message::Suggestion { text: &suggestion }.render(locale));

    let requirements = detect_requirements_file(pip_args).map(str::to_string);

    println!("{}", Message::FilterStart.render(locale));
    let candidates = extract_candidates(&suggestion);
    let report = filter_candidates(&candidates, requirements.as_deref());
    for rejection in &report.rejections {
        eprintln!("{}", rejection_message(rejection).render(locale));
    }
    if !report.has_safe_commands() {
        println!("{}", Message::FilterNoSafeCommands.render(locale));
        return Ok(result.exit_code);
    }

    let confirmer = InteractiveConfirmer { locale };
    let gate = FixGate::new(&runner, &confirmer, settings.auto_confirm);
    let outcome = gate.apply(&report.safe).await;

    if !outcome.applied {
        println!("{}", Message::FixNotApplied.render(locale));
        return Ok(result.exit_code);
    }

    println!("{}", Message::FixAttempted.render(locale));
    if let Some(file) = &requirements {
        if !outcome.installed_specifiers.is_empty() {
            match write_fixed_file(Path::new(file), &outcome.installed_specifiers) {
                Ok(path) => {
                    let filename = path.display().to_string();
                    println!(
                        "{}",
                        Message::FixedFileCreated {
                            filename: &filename
                        }
                        .render(locale)
                    );
                }
                Err(err) => {
                    let error = err.to_string();
                    println!("{}", Message::FixedFileFailed { error: &error }.render(locale));
                }
            }
        }
    }
    Ok(0)
}

/// Ask the advisory service for a suggestion, reporting every failure
/// path as a localized message. `None` covers both service failures and
/// an explicit "nothing actionable" answer.
async fn fetch_suggestion(
    settings: &Settings,
    locale: Locale,
    ctx: &ErrorContext,
) -> Option<String> {
    let client = match AdvisoryClient::new(settings.advisory_config()) {
        Ok(client) => client,
        Err(err) => {
            println!("{}", advisory_error_message(&err).render(locale));
            return None;
        }
    };

    match client.request_suggestion(ctx).await {
        Ok(Some(text)) => Some(text),
        Ok(None) => {
            println!("{}", Message::Uncertain.render(locale));
            None
        }
        Err(err) => {
            println!("{}", advisory_error_message(&err).render(locale));
            None
        }
    }
}

fn advisory_error_message(err: &AdvisoryError) -> Message<'_> {
    match err {
        AdvisoryError::InvalidServerUrl { url } => Message::InvalidServerUrl { url },
        AdvisoryError::Network { detail } => Message::NetworkError { detail },
        AdvisoryError::Server { status } => Message::ServerError { status: *status },
        AdvisoryError::ResponseParse { detail } => Message::JsonError { detail },
        AdvisoryError::ServiceUnavailable { url } => Message::ServiceUnavailable { url },
    }
}

fn rejection_message(rejection: &Rejection) -> Message<'_> {
    match rejection {
        Rejection::Tokenize { line } => Message::RejectedParse { line },
        Rejection::DisallowedSubstrings { line, .. } => Message::RejectedDisallowed { line },
        Rejection::NoAllowedPattern { line } => Message::RejectedNoMatch { line },
        Rejection::RequirementsReplay { line } => Message::RejectedReplay { line },
    }
}

/// Confirms commands by prompting on stdout and reading stdin. Prints
/// gate progress as it happens. End-of-input declines.
struct InteractiveConfirmer {
    locale: Locale,
}

#[async_trait]
impl Confirmer for InteractiveConfirmer {
    async fn confirm(&self, _command: &str) -> ConfirmDecision {
        print!("{}", Message::ConfirmPrompt.render(self.locale));
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(0) | Err(_) => ConfirmDecision::InputClosed,
            Ok(_) => {
                if line.trim().eq_ignore_ascii_case("y") {
                    ConfirmDecision::Confirmed
                } else {
                    ConfirmDecision::Declined
                }
            }
        }
    }

    async fn notify(&self, event: GateEvent<'_>) {
        match event {
            GateEvent::Proposed { command } => {
                println!("{}", Message::ProposingCommand { command }.render(self.locale));
            }
            GateEvent::Executing { .. } => {
                println!("{}", Message::ExecutingCommand.render(self.locale));
            }
            GateEvent::Skipped { .. } => {
                println!("{}", Message::SkippingExecution.render(self.locale));
            }
            GateEvent::Finished { command, result } => {
                if result.succeeded() {
                    println!("{}", Message::CommandSuccess { command }.render(self.locale));
                } else {
                    println!(
                        "{}",
                        Message::CommandFail {
                            command,
                            code: result.exit_code
                        }
                        .render(self.locale)
                    );
                }
            }
        }
    }
}
