//! Run configuration.
//!
//! Raw CLI/env values are first overridden by event annotations, then
//! validated into a [`RunConfig`] that the rest of the run reads.
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;

use crate::annotations::key_prefix;
use crate::check::CheckFailure;
use crate::cli::MultiplexArgs;
use crate::event::{Check, Entity, Event};
use crate::exec::ArgumentSplitting;
use crate::groups::CommonArgs;

/// Annotation keyspace for per-event configuration overrides.
pub const CONFIG_KEYSPACE: &str = "sensu.io/plugins/sensu-check-multiplexer/config";

/// Options that annotations may override, by their long flag name.
pub const OVERRIDABLE_OPTIONS: [&str; 8] = [
    "command",
    "common-arguments",
    "annotation-prefix",
    "check-name-prefix",
    "event-entity",
    "event-check",
    "dry-run",
    "events-api",
];

/// Validated settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub executable: String,
    pub common: CommonArgs,
    /// Normalized annotation prefix, always ending in `/`.
    pub key_prefix: String,
    pub check_name_prefix: String,
    pub entity_override: Option<Entity>,
    pub check_override: Option<Check>,
    pub dry_run: bool,
    pub events_api: String,
    pub splitting: ArgumentSplitting,
}

/// Apply `<keyspace>/<option>` annotations to `args`. Check annotations win
/// over entity annotations; empty values are ignored.
///
/// Returns the option names that were overridden.
pub fn apply_annotation_overrides(
    args: &mut MultiplexArgs,
    event: &Event,
) -> Result<Vec<&'static str>> {
    let mut applied = Vec::new();
    for option in OVERRIDABLE_OPTIONS {
        let key = format!("{CONFIG_KEYSPACE}/{option}");
        let found = [
            ("check", event.check_annotations()),
            ("entity", event.entity_annotations()),
        ]
        .into_iter()
        .find_map(|(source, annotations)| {
            annotations
                .and_then(|annotations| annotations.get(&key))
                .filter(|value| !value.is_empty())
                .map(|value| (source, value))
        });
        let Some((source, value)) = found else {
            continue;
        };
        set_option(args, option, value)
            .with_context(|| format!("apply {source} annotation {key}"))?;
        tracing::info!(option, source, value = %value, "configuration overridden by annotation");
        applied.push(option);
    }
    Ok(applied)
}

fn set_option(args: &mut MultiplexArgs, option: &str, value: &str) -> Result<()> {
    let value = value.to_string();
    match option {
        "command" => args.command = value,
        "common-arguments" => args.common_arguments = value,
        "annotation-prefix" => args.annotation_prefix = value,
        "check-name-prefix" => args.check_name_prefix = value,
        "event-entity" => args.event_entity = value,
        "event-check" => args.event_check = value,
        "dry-run" => args.dry_run = parse_bool(&value)?,
        "events-api" => args.events_api = value,
        _ => return Err(anyhow!("unsupported option {option}")),
    }
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(anyhow!("invalid boolean value {other:?}")),
    }
}

/// Check required settings and build the run configuration.
///
/// `stdin_piped` is false when stdin is a terminal, in which case there is
/// no event to multiplex.
pub fn validate(args: &MultiplexArgs, stdin_piped: bool) -> Result<RunConfig, CheckFailure> {
    if !stdin_piped {
        return Err(CheckFailure::critical(anyhow!(
            "monitoring event must be passed via stdin; if running under an agent, make sure stdin is enabled in the check definition"
        )));
    }
    let mut fields = args.command.split_whitespace();
    let Some(executable) = fields.next() else {
        return Err(CheckFailure::warning(anyhow!(
            "--command or MULTIPLEX_COMMAND environment variable is required"
        )));
    };
    let prefix_args = fields.collect::<Vec<_>>().join(" ");
    let Some(key_prefix) = key_prefix(&args.annotation_prefix) else {
        return Err(CheckFailure::warning(anyhow!(
            "--annotation-prefix or MULTIPLEX_ANNOTATION_PREFIX environment variable is required"
        )));
    };
    let entity_override = parse_override::<Entity>(&args.event_entity, "--event-entity")
        .map_err(CheckFailure::warning)?;
    let check_override = parse_override::<Check>(&args.event_check, "--event-check")
        .map_err(CheckFailure::warning)?;

    Ok(RunConfig {
        executable: executable.to_string(),
        common: CommonArgs {
            prefix: prefix_args,
            suffix: args.common_arguments.clone(),
        },
        key_prefix,
        check_name_prefix: args.check_name_prefix.clone(),
        entity_override,
        check_override,
        dry_run: args.dry_run,
        events_api: args.events_api.clone(),
        splitting: args.argument_splitting,
    })
}

fn parse_override<T: DeserializeOwned>(raw: &str, flag: &str) -> Result<Option<T>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let value = serde_json::from_str(raw).with_context(|| format!("parse {flag} JSON"))?;
    Ok(Some(value))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
