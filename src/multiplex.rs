//! Per-group fan-out and the final summary.
//!
//! Groups run concurrently, one scoped thread each; every thread owns its
//! result and results are merged in group order at the join point. Dry runs
//! execute groups one after another so the trace reads group by group.
use std::io::Write;
use std::thread;

use anyhow::{anyhow, Context, Result};

use crate::annotations::collect_groups;
use crate::check::CheckState;
use crate::config::RunConfig;
use crate::event::Event;
use crate::exec::{run_command, CommandRun};
use crate::groups::{synthesize_all, CommandLines};
use crate::output::{trace_line, Trace};
use crate::report::{check_name, report, EventSink, EventTemplate, ReportError};

/// One group's execution and reporting outcome.
#[derive(Debug)]
pub struct GroupResult {
    pub group: String,
    pub check_name: String,
    pub run: CommandRun,
    pub report_error: Option<ReportError>,
}

/// Derive command lines from the event's annotations.
pub fn plan(config: &RunConfig, event: &Event, trace: &Trace) -> CommandLines {
    trace_line!(trace, "Annotation Prefix: {}", config.key_prefix);
    let groups = collect_groups(event, &config.key_prefix, trace);
    if groups.is_empty() {
        tracing::info!(prefix = %config.key_prefix, "no annotations matched the prefix");
    }
    trace_line!(trace, "Final Annotation Map: {groups}");
    let lines = synthesize_all(&config.common, &groups);
    for (group, args) in &lines {
        tracing::debug!(group = %group, args = %args, "command line synthesized");
    }
    lines
}

/// Execute and report every group, returning results in group order.
pub fn run_groups(
    config: &RunConfig,
    event: &Event,
    lines: &CommandLines,
    sink: &dyn EventSink,
    trace: &Trace,
) -> Result<Vec<GroupResult>> {
    let template = EventTemplate {
        inbound: event,
        check_name_prefix: &config.check_name_prefix,
        entity_override: config.entity_override.as_ref(),
        check_override: config.check_override.as_ref(),
    };
    let run_group = |group: &str, args: &str| -> GroupResult {
        let run = run_command(&config.executable, args, config.splitting);
        trace_line!(
            trace,
            "Ran Command: {:?}\n Status: {}\n Err: {}",
            run.command_line,
            run.status,
            run.error.as_deref().unwrap_or("none")
        );
        let report_error = report(&template, sink, group, &run).err();
        GroupResult {
            group: group.to_string(),
            check_name: check_name(&config.check_name_prefix, group),
            run,
            report_error,
        }
    };

    if config.dry_run {
        return Ok(lines
            .iter()
            .map(|(group, args)| run_group(group.as_str(), args.as_str()))
            .collect());
    }

    thread::scope(|scope| {
        let handles = lines
            .iter()
            .map(|(group, args)| {
                let run_group = &run_group;
                let handle = thread::Builder::new()
                    .name(format!("group-{group}"))
                    .spawn_scoped(scope, move || run_group(group.as_str(), args.as_str()))
                    .with_context(|| format!("spawn task for group {group}"))?;
                Ok((group, handle))
            })
            .collect::<Result<Vec<_>>>()?;
        handles
            .into_iter()
            .map(|(group, handle)| {
                handle
                    .join()
                    .map_err(|_| anyhow!("task for group {group} panicked"))
            })
            .collect()
    })
}

/// Print the per-group summary and derive the aggregate state.
///
/// Only reporting failures turn the aggregate critical; command exit codes
/// are carried in each group's own event.
pub fn summarize<W: Write>(out: &mut W, results: &[GroupResult]) -> Result<CheckState> {
    writeln!(out, "Event Summary:").context("write summary")?;
    let mut report_failed = false;
    for result in results {
        let error = match &result.report_error {
            Some(err) => {
                report_failed = true;
                err.to_string()
            }
            None => "none".to_string(),
        };
        writeln!(
            out,
            "Event For Command: {}\n Output: {}\n Status: {}\n Error: {}",
            result.run.command_line, result.run.output, result.run.status, error
        )
        .context("write summary")?;
    }
    Ok(if report_failed {
        CheckState::Critical
    } else {
        CheckState::Ok
    })
}

/// The whole check: plan, fan out, summarize.
pub fn execute<W: Write>(
    config: &RunConfig,
    event: &Event,
    sink: &dyn EventSink,
    trace: &Trace,
    out: &mut W,
) -> Result<CheckState> {
    trace_line!(trace, "\nDry-run Output");
    let lines = plan(config, event, trace);
    let results = run_groups(config, event, &lines, sink, trace)?;
    for result in &results {
        tracing::debug!(
            group = %result.group,
            check = %result.check_name,
            status = result.run.status,
            reported = result.report_error.is_none(),
            "group finished"
        );
    }
    let failed = results.iter().filter(|r| r.report_error.is_some()).count();
    tracing::info!(groups = results.len(), report_failures = failed, "all groups finished");
    trace_line!(trace, "\n\nNormal Output");
    summarize(out, &results)
}

#[cfg(test)]
#[path = "multiplex_tests.rs"]
mod tests;
