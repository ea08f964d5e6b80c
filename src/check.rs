//! Check status codes and the validate/execute harness.
use anyhow::Result;
use std::fmt;
use std::process::ExitCode;

/// Monitoring check severities and their exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl CheckState {
    pub fn code(self) -> u32 {
        match self {
            CheckState::Ok => 0,
            CheckState::Warning => 1,
            CheckState::Critical => 2,
            CheckState::Unknown => 3,
        }
    }

    pub fn exit_code(self) -> ExitCode {
        // Codes are 0..=3.
        ExitCode::from(self.code() as u8)
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckState::Ok => "ok",
            CheckState::Warning => "warning",
            CheckState::Critical => "critical",
            CheckState::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// A failed callback: the state to exit with and what went wrong.
#[derive(Debug)]
pub struct CheckFailure {
    pub state: CheckState,
    pub error: anyhow::Error,
}

impl CheckFailure {
    pub fn warning(error: anyhow::Error) -> Self {
        Self {
            state: CheckState::Warning,
            error,
        }
    }

    pub fn critical(error: anyhow::Error) -> Self {
        Self {
            state: CheckState::Critical,
            error,
        }
    }
}

/// Run `validate`, then hand its output to `execute`, printing callback
/// errors the way check output is expected to look. Returns the final state.
pub fn run_check<T, V, E>(validate: V, execute: E) -> CheckState
where
    V: FnOnce() -> Result<T, CheckFailure>,
    E: FnOnce(T) -> Result<CheckState, CheckFailure>,
{
    let validated = match validate() {
        Ok(validated) => validated,
        Err(failure) => {
            println!("error validating input: {:#}", failure.error);
            return failure.state;
        }
    };
    match execute(validated) {
        Ok(state) => state,
        Err(failure) => {
            println!("error executing check: {:#}", failure.error);
            failure.state
        }
    }
}
