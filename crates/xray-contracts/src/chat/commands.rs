/// Separates an optional knowledge name from its content in `/kb_add` and
/// `/kb_update`.
pub const NAME_SEPARATOR: &str = "::";

/// How the text after a slash command is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArgShape {
    None,
    /// Everything after the command, trimmed, untouched otherwise.
    Raw,
    /// One shell-quoted path or name.
    Single,
    /// Any number of shell-quoted paths.
    Many,
    /// `[name ::] content`.
    Named,
    /// `<id> [name ::] content`.
    IdNamed,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub shape: ArgShape,
    pub usage: &'static str,
}

const fn entry(command: &'static str, shape: ArgShape, usage: &'static str) -> CommandSpec {
    CommandSpec {
        command,
        shape,
        usage,
    }
}

pub(crate) const COMMANDS: &[CommandSpec] = &[
    entry("add", ArgShape::Many, "/add <path>..."),
    entry("remove", ArgShape::Single, "/remove <name>"),
    entry("images", ArgShape::None, "/images"),
    entry("clear", ArgShape::None, "/clear"),
    entry("analyze", ArgShape::None, "/analyze"),
    entry("feedback", ArgShape::Raw, "/feedback <text>"),
    entry("report", ArgShape::None, "/report"),
    entry("export", ArgShape::Single, "/export <path>"),
    entry("kb_list", ArgShape::None, "/kb_list"),
    entry("kb_add", ArgShape::Named, "/kb_add [name ::] <content>"),
    entry("kb_update", ArgShape::IdNamed, "/kb_update <id> [name ::] <content>"),
    entry("kb_remove", ArgShape::Single, "/kb_remove <id>"),
    entry("templates", ArgShape::None, "/templates"),
    entry("kb_template", ArgShape::Single, "/kb_template <key>"),
    entry("status", ArgShape::None, "/status"),
    entry("help", ArgShape::None, "/help"),
    entry("quit", ArgShape::None, "/quit"),
    entry("exit", ArgShape::None, "/exit"),
];

pub(crate) fn find_command(command: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.command == command)
}

/// Usage strings in help order.
pub fn help_lines() -> Vec<&'static str> {
    COMMANDS.iter().map(|spec| spec.usage).collect()
}
