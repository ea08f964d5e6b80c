//! Run-scoped argument groups and command line synthesis.
//!
//! A group collects `--option value` pairs from annotations, or a single
//! verbatim argument string that replaces them.
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArgumentGroup {
    pub options: BTreeMap<String, String>,
    pub verbatim: Option<String>,
}

impl ArgumentGroup {
    /// The group's own arguments: the verbatim string when set and non-empty,
    /// otherwise `--option value` for every option.
    pub fn body(&self) -> String {
        if let Some(verbatim) = self.verbatim.as_deref().filter(|value| !value.is_empty()) {
            return verbatim.to_string();
        }
        self.options
            .iter()
            .map(|(option, value)| format!("--{option} {value}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Group name -> accumulated arguments for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArgumentGroups {
    groups: BTreeMap<String, ArgumentGroup>,
}

impl ArgumentGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the group if it does not exist yet. Returns true on creation.
    pub fn ensure_group(&mut self, name: &str) -> bool {
        if self.groups.contains_key(name) {
            return false;
        }
        self.groups.insert(name.to_string(), ArgumentGroup::default());
        true
    }

    pub fn set_option(&mut self, name: &str, option: &str, value: &str) {
        self.ensure_group(name);
        if let Some(group) = self.groups.get_mut(name) {
            group.options.insert(option.to_string(), value.to_string());
        }
    }

    pub fn set_verbatim(&mut self, name: &str, value: &str) {
        self.ensure_group(name);
        if let Some(group) = self.groups.get_mut(name) {
            group.verbatim = Some(value.to_string());
        }
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&ArgumentGroup> {
        self.groups.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgumentGroup)> {
        self.groups.iter().map(|(name, group)| (name.as_str(), group))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl fmt::Display for ArgumentGroups {
    /// Compact `group: {option: value}` rendering used by the dry-run trace.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (name, group)) in self.groups.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name:?}: {{")?;
            for (opt_idx, (option, value)) in group.options.iter().enumerate() {
                if opt_idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{option:?}: {value:?}")?;
            }
            write!(f, "}}")?;
            if let Some(verbatim) = &group.verbatim {
                write!(f, " verbatim={verbatim:?}")?;
            }
        }
        write!(f, "}}")
    }
}

/// Common arguments shared by every group's command line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommonArgs {
    pub prefix: String,
    pub suffix: String,
}

/// One synthesized command line per group.
pub type CommandLines = BTreeMap<String, String>;

/// `common prefix + " " + body + " " + common suffix`.
///
/// The result is re-tokenized before spawning, so surrounding whitespace is
/// harmless.
pub fn synthesize(common: &CommonArgs, group: &ArgumentGroup) -> String {
    format!("{} {} {}", common.prefix, group.body(), common.suffix)
}

pub fn synthesize_all(common: &CommonArgs, groups: &ArgumentGroups) -> CommandLines {
    groups
        .iter()
        .map(|(name, group)| (name.to_string(), synthesize(common, group)))
        .collect()
}
