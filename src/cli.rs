//! CLI argument parsing.
//!
//! Every option can also come from the environment; a few can be overridden
//! per event through annotations (see `config::apply_annotation_overrides`).
use clap::Parser;

use crate::exec::ArgumentSplitting;

pub const DEFAULT_CHECK_NAME_PREFIX: &str = "multiplex_";
pub const DEFAULT_EVENTS_API: &str = "http://localhost:3031/events";

/// Run one sub-command per annotation group and report each as an event.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "check-multiplexer",
    version,
    about = "Check multiplexer: fan a check out into one command per annotation group",
    after_help = "The monitoring event is read from stdin.\n\nExamples:\n  check-multiplexer -c probe -p acme.io/chk < event.json\n  check-multiplexer -c 'probe --quiet' -p acme.io/chk -a '--format nagios' --dry-run < event.json"
)]
pub struct MultiplexArgs {
    /// Command executable to run, optionally followed by arguments placed before each group's arguments
    #[arg(short = 'c', long, env = "MULTIPLEX_COMMAND", default_value = "", allow_hyphen_values = true)]
    pub command: String,

    /// Common arguments for all annotation groups, appended to the end of the command
    #[arg(
        short = 'a',
        long,
        env = "MULTIPLEX_COMMON_ARGUMENTS",
        default_value = "",
        allow_hyphen_values = true
    )]
    pub common_arguments: String,

    /// Annotation key prefix to parse for command groups
    #[arg(short = 'p', long, env = "MULTIPLEX_ANNOTATION_PREFIX", default_value = "")]
    pub annotation_prefix: String,

    /// Prefix for the check name of each annotation group's event
    #[arg(long, env = "MULTIPLEX_CHECK_NAME_PREFIX", default_value = DEFAULT_CHECK_NAME_PREFIX)]
    pub check_name_prefix: String,

    /// JSON entity to substitute into generated events
    #[arg(long, env = "MULTIPLEX_EVENT_ENTITY", default_value = "")]
    pub event_entity: String,

    /// JSON check to substitute into generated events
    #[arg(long, env = "MULTIPLEX_EVENT_CHECK", default_value = "")]
    pub event_check: String,

    /// Print generated events to stdout instead of sending them to the events API
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Events API endpoint that receives generated events
    #[arg(long, default_value = DEFAULT_EVENTS_API)]
    pub events_api: String,

    /// How each group's argument string is split into argv
    #[arg(
        long,
        value_enum,
        env = "MULTIPLEX_ARGUMENT_SPLITTING",
        default_value_t = ArgumentSplitting::Whitespace
    )]
    pub argument_splitting: ArgumentSplitting,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_flags_are_absent() {
        let args =
            MultiplexArgs::try_parse_from(["check-multiplexer", "-c", "probe", "-p", "acme.io/chk"])
                .expect("parse args");
        assert_eq!(args.command, "probe");
        assert_eq!(args.annotation_prefix, "acme.io/chk");
        assert_eq!(args.check_name_prefix, DEFAULT_CHECK_NAME_PREFIX);
        assert_eq!(args.events_api, DEFAULT_EVENTS_API);
        assert_eq!(args.argument_splitting, ArgumentSplitting::Whitespace);
        assert!(!args.dry_run);
    }

    #[test]
    fn long_flags_parse() {
        let args = MultiplexArgs::try_parse_from([
            "check-multiplexer",
            "--command",
            "probe --quiet",
            "--common-arguments",
            "--format nagios",
            "--annotation-prefix",
            "acme.io/chk",
            "--check-name-prefix",
            "mx_",
            "--events-api",
            "http://127.0.0.1:9/events",
            "--argument-splitting",
            "shell",
            "--dry-run",
        ])
        .expect("parse args");
        assert_eq!(args.common_arguments, "--format nagios");
        assert_eq!(args.check_name_prefix, "mx_");
        assert_eq!(args.argument_splitting, ArgumentSplitting::Shell);
        assert!(args.dry_run);
    }
}
