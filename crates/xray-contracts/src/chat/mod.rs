mod commands;
mod parser;

pub use commands::{help_lines, NAME_SEPARATOR};
pub use parser::{parse_command, ChatCommand};
