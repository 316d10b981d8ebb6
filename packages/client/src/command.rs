//! Input line parsing.

/// One line typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text for the active room
    Say(String),
    Open(String),
    Close,
    Rooms,
    History,
    Queue,
    Retry(u64),
    Discard(u64),
    Status,
    Help,
    Quit,
    /// Anything that could not be understood, with a hint for the user
    Invalid(String),
}

pub const HELP: &str = "\
/open <room>     switch the active room
/close           leave the active room
/rooms           list rooms (newest first)
/history         messages received in the active room
/queue           outbound messages awaiting an ack
/retry <seq>     re-send a failed message
/discard <seq>   drop a queued message
/status          connection state
/quit            log out and exit
anything else is sent to the active room";

impl Command {
    /// Parse a trimmed, non-empty input line
    pub fn parse(line: &str) -> Self {
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Say(line.to_string());
        };

        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).filter(|arg| !arg.is_empty());

        match (name, arg) {
            ("open" | "o", Some(room)) => Command::Open(room.to_string()),
            ("open" | "o", None) => Command::Invalid("usage: /open <room>".to_string()),
            ("close", _) => Command::Close,
            ("rooms", _) => Command::Rooms,
            ("history", _) => Command::History,
            ("queue", _) => Command::Queue,
            ("retry", arg) => parse_seq(arg).map_or_else(
                || Command::Invalid("usage: /retry <seq>".to_string()),
                Command::Retry,
            ),
            ("discard", arg) => parse_seq(arg).map_or_else(
                || Command::Invalid("usage: /discard <seq>".to_string()),
                Command::Discard,
            ),
            ("status", _) => Command::Status,
            ("help" | "?", _) => Command::Help,
            ("quit" | "exit" | "q", _) => Command::Quit,
            (other, _) => Command::Invalid(format!("unknown command /{other}, try /help")),
        }
    }
}

fn parse_seq(arg: Option<&str>) -> Option<u64> {
    arg?.trim_start_matches('#').parse().ok()
}
