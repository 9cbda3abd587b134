use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// How a command is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum Mode {
    /// Run to completion and capture the whole standard output.
    OneShot,
    /// Run indefinitely, delivering each line of standard output as it arrives.
    Polling,
}

/// Identity of an external command. Two `Polling` subscriptions with equal descriptors share one process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub executable: String,
    pub args: Vec<String>,
    pub mode: Mode,
}

impl CommandDescriptor {
    pub fn new<I, S>(executable: impl Into<String>, args: I, mode: Mode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { executable: executable.into(), args: args.into_iter().map(Into::into).collect(), mode }
    }

    pub fn one_shot<I, S>(executable: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(executable, args, Mode::OneShot)
    }

    pub fn polling<I, S>(executable: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(executable, args, Mode::Polling)
    }
}

impl std::fmt::Display for CommandDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.executable)
        } else {
            write!(f, "{} {}", self.executable, self.args.iter().join(" "))
        }
    }
}

/// A request to run a command, as issued by a widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub descriptor: CommandDescriptor,
    /// `false` marks a fire-and-forget call whose result nobody awaits.
    pub resolves: bool,
}

impl Invocation {
    pub fn resolving(descriptor: CommandDescriptor) -> Self {
        Self { descriptor, resolves: true }
    }

    pub fn detached(descriptor: CommandDescriptor) -> Self {
        Self { descriptor, resolves: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_display() {
        assert_eq!(CommandDescriptor::one_shot("wlogout", Vec::<String>::new()).to_string(), "wlogout");
        assert_eq!(CommandDescriptor::one_shot("hyprctl", ["workspaces", "-j"]).to_string(), "hyprctl workspaces -j");
    }

    #[test]
    fn test_mode_is_part_of_identity() {
        let mut set = HashSet::new();
        set.insert(CommandDescriptor::polling("backend", ["--sysinfo-poll-interval", "2"]));
        set.insert(CommandDescriptor::polling("backend", ["--sysinfo-poll-interval", "2"]));
        set.insert(CommandDescriptor::one_shot("backend", ["--sysinfo-poll-interval", "2"]));
        assert_eq!(set.len(), 2);
    }
}
