use anyhow::Context;
use clap::Parser;
use std::io::{self, IsTerminal};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod annotations;
mod check;
mod cli;
mod config;
mod event;
mod exec;
mod groups;
mod multiplex;
mod output;
mod report;

use check::{run_check, CheckFailure, CheckState};
use cli::MultiplexArgs;
use output::{trace_line, Trace};
use report::{DryRunSink, EventSink, HttpSink};

fn main() -> ExitCode {
    init_tracing();
    let mut args = MultiplexArgs::parse();

    let stdin = io::stdin();
    let stdin_piped = !stdin.is_terminal();
    let event = if stdin_piped {
        match event::read_event(stdin.lock()) {
            Ok(event) => event,
            Err(err) => {
                println!("error reading event: {err:#}");
                return CheckState::Critical.exit_code();
            }
        }
    } else {
        event::Event::default()
    };

    let state = run_check(
        || {
            config::apply_annotation_overrides(&mut args, &event)
                .map_err(CheckFailure::warning)?;
            let config = config::validate(&args, stdin_piped)?;
            let trace = if config.dry_run {
                Trace::stdout()
            } else {
                Trace::off()
            };
            trace_line!(
                trace,
                "Command: {} Common Args: {}",
                config.executable,
                config.common.prefix
            );
            Ok((config, trace))
        },
        |(config, trace)| {
            let sink: Box<dyn EventSink + '_> = if config.dry_run {
                Box::new(DryRunSink::new(config.events_api.as_str(), &trace))
            } else {
                Box::new(HttpSink::new(config.events_api.as_str()))
            };
            let mut stdout = io::stdout();
            multiplex::execute(&config, &event, sink.as_ref(), &trace, &mut stdout)
                .context("multiplex check")
                .map_err(CheckFailure::critical)
        },
    );
    tracing::info!(state = %state, "check finished");
    state.exit_code()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}
