use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Quote,
    Cancel,
    Analyze,
    Docs,
    Ports,
    Carriers,
    Status,
    Unknown(String),
}

impl BotCommand {
    pub fn name(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Quote => "quote",
            Self::Cancel => "cancel",
            Self::Analyze => "analyze",
            Self::Docs => "docs",
            Self::Ports => "ports",
            Self::Carriers => "carriers",
            Self::Status => "status",
            Self::Unknown(name) => name,
        }
    }

    fn from_name(name: &str) -> Self {
        match name {
            "start" => Self::Start,
            "help" => Self::Help,
            "quote" => Self::Quote,
            "cancel" => Self::Cancel,
            "analyze" => Self::Analyze,
            "docs" => Self::Docs,
            "ports" => Self::Ports,
            "carriers" => Self::Carriers,
            "status" => Self::Status,
            other => Self::Unknown(other.to_owned()),
        }
    }
}

/// Commands advertised through `setMyCommands`, in menu order.
pub const COMMAND_MENU: [(&str, &str); 8] = [
    ("quote", "Interactive quote + PDF"),
    ("cancel", "Cancel the quote in progress"),
    ("analyze", "Document analyzer"),
    ("ports", "Port list"),
    ("carriers", "Shipping companies"),
    ("docs", "Documents guide"),
    ("status", "System status"),
    ("help", "Commands and features"),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: BotCommand,
    pub args: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("command is addressed to @{0}")]
    AddressedElsewhere(String),
}

/// Parses `/name[@bot] args`. `Ok(None)` means the text is not a command.
///
/// Group chats suffix commands with the bot username; a command naming a
/// different bot is rejected so it is not answered twice.
pub fn parse_command(
    text: &str,
    bot_username: Option<&str>,
) -> Result<Option<ParsedCommand>, CommandParseError> {
    let trimmed = text.trim_start();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(None);
    };

    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let (name, addressee) = match head.split_once('@') {
        Some((name, addressee)) => (name, Some(addressee)),
        None => (head, None),
    };

    if let (Some(addressee), Some(bot_username)) = (addressee, bot_username) {
        if !addressee.eq_ignore_ascii_case(bot_username.trim_start_matches('@')) {
            return Err(CommandParseError::AddressedElsewhere(addressee.to_owned()));
        }
    }

    Ok(Some(ParsedCommand {
        command: BotCommand::from_name(&name.to_ascii_lowercase()),
        args: args.to_owned(),
    }))
}
