//! pipfix Core Library
//!
//! The pipeline that turns a failed `pip install` into a vetted,
//! confirmed repair:
//!
//! failed install → [`advisory`] fetches a suggestion → [`extract`]
//! yields candidate lines → [`filter`] yields safe commands → [`gate`]
//! executes approved ones via [`runner`], producing a [`FixOutcome`].
//!
//! Supporting modules: [`settings`] (configuration resolution),
//! [`messages`] (localized user-facing text), [`machine`] (correlation
//! identifier), [`requirements`] (repaired-file artifact), and
//! [`telemetry`] (tracing initialisation).

pub mod advisory;
pub mod error;
pub mod extract;
pub mod filter;
pub mod gate;
pub mod machine;
pub mod messages;
pub mod requirements;
pub mod runner;
pub mod settings;
pub mod telemetry;

pub use advisory::{AdvisoryClient, AdvisoryConfig, ErrorContext, RetryPolicy};
pub use error::{AdvisoryError, AdvisoryResult};
pub use extract::{extract_candidates, CandidateCommand};
pub use filter::{
    filter_candidates, FilterReport, Rejection, SafeCommand, DISALLOWED_SUBSTRINGS,
};
pub use gate::{
    CommandReport, ConfirmDecision, Confirmer, Disposition, FixGate, FixOutcome, GateEvent,
};
pub use machine::machine_id;
pub use messages::{resolve_locale, system_locale, Locale, Message};
pub use requirements::{
    detect_requirements_file, fixed_path, write_fixed_file, FIXED_FILE_HEADER,
};
pub use runner::{
    CommandRunner, ExecutionResult, ProcessRunner, DEFAULT_CHILD_TIMEOUT, EXIT_NOT_FOUND,
    EXIT_PERMISSION_DENIED,
};
pub use settings::{
    ConfigFile, EnvSettings, SettingOverrides, Settings, DEFAULT_MAX_RETRIES, DEFAULT_SERVER_URL,
    DEFAULT_TIMEOUT_SECS,
};
pub use telemetry::init_tracing;
