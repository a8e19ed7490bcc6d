/// Slash commands shown by `/help`, in display order.
pub const COMMAND_HELP: [(&str, &str); 11] = [
    ("/quit", "Exit the program"),
    ("/exit", "Exit the program"),
    ("/help", "Show this help"),
    ("/reset", "Clear the current conversation (keeps long-term memory)"),
    ("/remember", "Add a manual memory snippet (stored to the memory file)"),
    ("/rewind", "Go back to the previous bot message (removes last exchange)"),
    ("/export", "Save the current transcript to the transcripts folder"),
    ("/persona", "Show the loaded BotInfo persona"),
    ("/nsfw", "Enable/disable NSFW mode for adult-oriented roleplay"),
    ("/romantic", "Enable/disable romantic mode"),
    ("/search", "Search memories for keywords"),
];

pub const REMEMBER_USAGE: &str = "Provide text after /remember";
pub const SEARCH_USAGE: &str = "Please provide search terms";
pub const TOGGLE_USAGE: &str = "Please specify 'on' or 'off'";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Exit,
    Help,
    Reset,
    Remember { note: String },
    Rewind,
    Export,
    Persona,
    Nsfw { enabled: bool },
    Romantic { enabled: bool },
    Search { query: String },
    /// A known command with missing or malformed arguments.
    Invalid { usage: &'static str },
    /// A slash word that names no command.
    Unknown { name: String },
    Prompt { text: String },
}

pub struct ReplCommandParser;

impl ReplCommandParser {
    /// Parse one input line; blank lines yield `None`.
    pub fn parse(input: &str) -> Option<ReplCommand> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        if !trimmed.starts_with('/') {
            return Some(ReplCommand::Prompt {
                text: trimmed.to_string(),
            });
        }

        let (name, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (trimmed, ""),
        };
        let args = rest.split_whitespace().collect::<Vec<_>>().join(" ");

        let command = match name.to_ascii_lowercase().as_str() {
            "/quit" | "/exit" => ReplCommand::Exit,
            "/help" => ReplCommand::Help,
            "/reset" => ReplCommand::Reset,
            "/rewind" => ReplCommand::Rewind,
            "/export" => ReplCommand::Export,
            "/persona" => ReplCommand::Persona,
            "/remember" if args.is_empty() => ReplCommand::Invalid {
                usage: REMEMBER_USAGE,
            },
            "/remember" => ReplCommand::Remember { note: args },
            "/search" if args.is_empty() => ReplCommand::Invalid {
                usage: SEARCH_USAGE,
            },
            "/search" => ReplCommand::Search { query: args },
            "/nsfw" => match parse_toggle(&args) {
                Some(enabled) => ReplCommand::Nsfw { enabled },
                None => ReplCommand::Invalid {
                    usage: TOGGLE_USAGE,
                },
            },
            "/romantic" => match parse_toggle(&args) {
                Some(enabled) => ReplCommand::Romantic { enabled },
                None => ReplCommand::Invalid {
                    usage: TOGGLE_USAGE,
                },
            },
            _ => ReplCommand::Unknown {
                name: name.to_string(),
            },
        };
        Some(command)
    }
}

fn parse_toggle(args: &str) -> Option<bool> {
    match args.split_whitespace().next()?.to_ascii_lowercase().as_str() {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

/// `/help` output: one padded line per command.
pub fn help_text() -> String {
    let mut text = String::from("Commands:");
    for (name, description) in COMMAND_HELP {
        text.push_str(&format!("\n{name:<15} {description}"));
    }
    text
}
