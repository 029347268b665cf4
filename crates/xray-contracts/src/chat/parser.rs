use super::commands::{find_command, ArgShape, NAME_SEPARATOR};

/// One line of chat input, resolved to what the session should do.
///
/// Plain text (no leading `/`) is feedback on the current report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Noop,
    Help,
    Quit,
    AddImages(Vec<String>),
    RemoveImage(String),
    ListImages,
    ClearImages,
    Analyze,
    Feedback(String),
    ShowReport,
    Export(String),
    KbList,
    KbAdd {
        name: String,
        content: String,
    },
    KbUpdate {
        id: String,
        name: String,
        content: String,
    },
    KbRemove(String),
    ListTemplates,
    KbTemplate(String),
    ShowStatus,
    Unknown {
        command: String,
        arg: String,
    },
}

enum Args {
    None,
    Text(String),
    Paths(Vec<String>),
    Named { name: String, content: String },
    IdNamed { id: String, name: String, content: String },
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    shell_words::split(arg)
        .unwrap_or_else(|_| arg.split_whitespace().map(str::to_string).collect())
        .into_iter()
        .filter(|value| !value.is_empty())
        .collect()
}

/// Splits `name :: content`. Without a separator the whole argument is
/// content and the name is empty.
fn split_named_content(arg: &str) -> (String, String) {
    match arg.split_once(NAME_SEPARATOR) {
        Some((name, content)) => (name.trim().to_string(), content.trim().to_string()),
        None => (String::new(), arg.trim().to_string()),
    }
}

fn read_args(shape: ArgShape, arg: &str) -> Args {
    match shape {
        ArgShape::None => Args::None,
        ArgShape::Raw => Args::Text(arg.to_string()),
        ArgShape::Single => Args::Text(parse_path_args(arg).join(" ")),
        ArgShape::Many => Args::Paths(parse_path_args(arg)),
        ArgShape::Named => {
            let (name, content) = split_named_content(arg);
            Args::Named { name, content }
        }
        ArgShape::IdNamed => {
            let (id, rest) = arg.split_once(char::is_whitespace).unwrap_or((arg, ""));
            let (name, content) = split_named_content(rest);
            Args::IdNamed {
                id: id.to_string(),
                name,
                content,
            }
        }
    }
}

fn text(args: Args) -> String {
    match args {
        Args::Text(text) => text,
        _ => String::new(),
    }
}

fn build(command: &str, args: Args) -> ChatCommand {
    match (command, args) {
        ("add", Args::Paths(paths)) => ChatCommand::AddImages(paths),
        ("remove", args) => ChatCommand::RemoveImage(text(args)),
        ("images", _) => ChatCommand::ListImages,
        ("clear", _) => ChatCommand::ClearImages,
        ("analyze", _) => ChatCommand::Analyze,
        ("feedback", args) => ChatCommand::Feedback(text(args)),
        ("report", _) => ChatCommand::ShowReport,
        ("export", args) => ChatCommand::Export(text(args)),
        ("kb_list", _) => ChatCommand::KbList,
        ("kb_add", Args::Named { name, content }) => ChatCommand::KbAdd { name, content },
        ("kb_update", Args::IdNamed { id, name, content }) => {
            ChatCommand::KbUpdate { id, name, content }
        }
        ("kb_remove", args) => ChatCommand::KbRemove(text(args)),
        ("templates", _) => ChatCommand::ListTemplates,
        ("kb_template", args) => ChatCommand::KbTemplate(text(args)),
        ("status", _) => ChatCommand::ShowStatus,
        ("help", _) => ChatCommand::Help,
        ("quit" | "exit", _) => ChatCommand::Quit,
        (other, _) => ChatCommand::Unknown {
            command: other.to_string(),
            arg: String::new(),
        },
    }
}

pub fn parse_command(line: &str) -> ChatCommand {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ChatCommand::Noop;
    }

    let Some(tail) = trimmed.strip_prefix('/') else {
        return ChatCommand::Feedback(trimmed.to_string());
    };
    let command_len = tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return ChatCommand::Feedback(trimmed.to_string());
    }

    let command = tail[..command_len].to_ascii_lowercase();
    let arg = tail[command_len..].trim();
    match find_command(&command) {
        Some(spec) => build(spec.command, read_args(spec.shape, arg)),
        None => ChatCommand::Unknown {
            command,
            arg: arg.to_string(),
        },
    }
}
