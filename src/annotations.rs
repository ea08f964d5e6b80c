//! Annotation key parsing.
//!
//! Keys look like `<prefix>/<group>/<option>`. `<prefix>/<group>` and
//! `<prefix>/<group>/<group>` carry a verbatim argument string for the group.
use crate::event::Event;
use crate::groups::ArgumentGroups;
use crate::output::{trace_line, Trace};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAnnotation<'a> {
    pub group: &'a str,
    /// `None` for the verbatim form.
    pub option: Option<&'a str>,
    pub value: &'a str,
}

/// Where an annotation map came from; only used for trace output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationSource {
    Check,
    Entity,
}

impl AnnotationSource {
    fn label(self) -> &'static str {
        match self {
            AnnotationSource::Check => "Check",
            AnnotationSource::Entity => "Entity",
        }
    }
}

/// Normalize a configured prefix to `prefix/`. Returns `None` when blank.
pub fn key_prefix(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!("{trimmed}/"))
}

/// Parse a single key against a normalized `prefix/`.
pub fn parse_key<'a>(key: &'a str, value: &'a str, key_prefix: &str) -> Option<ParsedAnnotation<'a>> {
    let remainder = key.strip_prefix(key_prefix)?;
    if remainder.is_empty() {
        return None;
    }
    let (group, rest) = match remainder.split_once('/') {
        Some((group, rest)) => (group, Some(rest)),
        None => (remainder, None),
    };
    if group.is_empty() {
        return None;
    }
    let option = match rest {
        None => None,
        Some(rest) if rest == group => None,
        Some("") => return None,
        Some(rest) => Some(rest),
    };
    Some(ParsedAnnotation {
        group,
        option,
        value,
    })
}

/// Parse every matching key in `annotations`, in key order.
pub fn parse_annotations<'a>(
    annotations: &'a BTreeMap<String, String>,
    key_prefix: &'a str,
) -> impl Iterator<Item = ParsedAnnotation<'a>> + 'a {
    annotations
        .iter()
        .filter_map(move |(key, value)| parse_key(key, value, key_prefix))
}

/// Fold one annotation map into `groups`. Later writes replace earlier ones.
pub fn apply_annotations(
    groups: &mut ArgumentGroups,
    annotations: &BTreeMap<String, String>,
    source: AnnotationSource,
    key_prefix: &str,
    trace: &Trace,
) {
    let label = source.label();
    for parsed in parse_annotations(annotations, key_prefix) {
        if groups.ensure_group(parsed.group) {
            trace_line!(trace, "{label} initialize Map: {}", parsed.group);
        }
        match parsed.option {
            None => {
                groups.set_verbatim(parsed.group, parsed.value);
                trace_line!(
                    trace,
                    "{label} annotation: Group: {} Args Value: {}",
                    parsed.group,
                    parsed.value
                );
            }
            Some(option) => {
                groups.set_option(parsed.group, option, parsed.value);
                trace_line!(
                    trace,
                    "{label} annotation: Group: {} Opt: {} Value: {}",
                    parsed.group,
                    option,
                    parsed.value
                );
            }
        }
    }
}

/// Build the run's argument groups from check annotations, then entity
/// annotations, so entity values win on identical keys.
pub fn collect_groups(event: &Event, key_prefix: &str, trace: &Trace) -> ArgumentGroups {
    let mut groups = ArgumentGroups::new();
    if let Some(annotations) = event.check_annotations() {
        apply_annotations(&mut groups, annotations, AnnotationSource::Check, key_prefix, trace);
    }
    if let Some(annotations) = event.entity_annotations() {
        apply_annotations(&mut groups, annotations, AnnotationSource::Entity, key_prefix, trace);
    }
    tracing::debug!(groups = groups.len(), prefix = key_prefix, "annotation groups collected");
    groups
}

#[cfg(test)]
#[path = "annotations_tests.rs"]
mod tests;
