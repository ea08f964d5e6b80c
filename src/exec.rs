//! Subprocess execution for one argument group.
//!
//! stdout and stderr share a single pipe so the captured output keeps the
//! interleaving the command produced.
use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::Instant;

use crate::check::CheckState;

/// How a synthesized argument string is turned into argv.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ArgumentSplitting {
    /// Split on runs of whitespace; quotes are not interpreted.
    #[default]
    Whitespace,
    /// POSIX shell-word rules, so quoted values stay one argument.
    Shell,
}

impl ArgumentSplitting {
    pub fn split(self, args: &str) -> Result<Vec<String>> {
        match self {
            ArgumentSplitting::Whitespace => {
                Ok(args.split_whitespace().map(str::to_string).collect())
            }
            ArgumentSplitting::Shell => {
                shell_words::split(args).with_context(|| format!("split arguments: {args}"))
            }
        }
    }
}

/// Outcome of running one group's command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRun {
    pub command_line: String,
    pub status: u32,
    pub output: String,
    /// Spawn failure, abnormal termination or non-zero exit, as text.
    pub error: Option<String>,
}

/// Run `executable` with the tokenized `args` and wait for it to exit.
///
/// Never fails: spawn errors and signal deaths are folded into an
/// [`CheckState::Unknown`] status.
pub fn run_command(executable: &str, args: &str, splitting: ArgumentSplitting) -> CommandRun {
    let argv = match splitting.split(args) {
        Ok(argv) => argv,
        Err(err) => {
            let command_line = format!("{executable} {}", args.trim());
            return unknown_failure(command_line, &err);
        }
    };
    let command_line = format_command_line(executable, &argv);
    let start = Instant::now();
    let run = match spawn_combined(executable, &argv) {
        Ok((output, status)) => match status.code() {
            Some(code) => CommandRun {
                command_line,
                // Negative codes only occur on Windows; keep the raw bits.
                status: code as u32,
                output,
                error: (code != 0).then(|| format!("exit status {code}")),
            },
            None => CommandRun {
                command_line,
                status: CheckState::Unknown.code(),
                output,
                error: Some(exit_status_string(&status)),
            },
        },
        Err(err) => unknown_failure(command_line, &err),
    };
    tracing::info!(
        command = %run.command_line,
        status = run.status,
        output_bytes = run.output.len(),
        elapsed_ms = start.elapsed().as_millis(),
        "command complete"
    );
    run
}

fn unknown_failure(command_line: String, err: &anyhow::Error) -> CommandRun {
    tracing::warn!(command = %command_line, error = %format!("{err:#}"), "command did not run");
    CommandRun {
        command_line,
        status: CheckState::Unknown.code(),
        output: format!("Unknown error running command: {err:#}"),
        error: Some(format!("{err:#}")),
    }
}

fn spawn_combined(executable: &str, argv: &[String]) -> Result<(String, std::process::ExitStatus)> {
    if executable.is_empty() {
        return Err(anyhow!("executable is empty"));
    }
    let (mut reader, writer) = std::io::pipe().context("create output pipe")?;
    let stderr_writer = writer.try_clone().context("clone output pipe")?;
    let mut command = Command::new(executable);
    command
        .args(argv)
        .stdin(Stdio::null())
        .stdout(writer)
        .stderr(stderr_writer);
    let mut child = command
        .spawn()
        .with_context(|| format!("spawn {executable}"))?;
    // The command still owns the write ends; reading would never see EOF.
    drop(command);

    let mut bytes = Vec::new();
    let read_result = reader.read_to_end(&mut bytes);
    let status = child.wait().with_context(|| format!("wait for {executable}"))?;
    read_result.with_context(|| format!("read output of {executable}"))?;
    Ok((String::from_utf8_lossy(&bytes).into_owned(), status))
}

fn exit_status_string(status: &std::process::ExitStatus) -> String {
    if let Some(code) = status.code() {
        format!("exit status {code}")
    } else {
        "terminated by signal".to_string()
    }
}

pub fn format_command_line(executable: &str, argv: &[String]) -> String {
    let mut parts = Vec::with_capacity(argv.len() + 1);
    parts.push(shell_quote(executable));
    for arg in argv {
        parts.push(shell_quote(arg));
    }
    parts.join(" ")
}

fn shell_quote(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    let safe = arg.chars().all(|ch| {
        matches!(
            ch,
            'a'..='z'
                | 'A'..='Z'
                | '0'..='9'
                | '_'
                | '-'
                | '.'
                | '/'
                | ':'
                | '='
                | ','
                | '+'
                | '@'
        )
    });
    if safe {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', "'\\''"))
}
