//! Interactive REPL parse rules. Input beginning with `/` is a slash
//! command, case-insensitively matched against a known set or rejected;
//! anything else is natural language routed to the [`crate::nl::NlPipeline`].

/// A parsed slash command, or the raw text if it wasn't a recognized one.
#[derive(Clone, Debug, PartialEq)]
pub enum SlashCommand {
    Help,
    Status,
    Pause,
    Resume,
    Stop,
    SendToImplementer(String),
    OverrideDecision(Override),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Override {
    Proceed,
    Retry,
    Clarify,
    Escalate,
}

impl Override {
    fn parse(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "proceed" => Some(Self::Proceed),
            "retry" => Some(Self::Retry),
            "clarify" => Some(Self::Clarify),
            "escalate" => Some(Self::Escalate),
            _ => None,
        }
    }
}

/// What a line of REPL input routes to.
#[derive(Clone, Debug, PartialEq)]
pub enum ReplInput {
    Slash(SlashCommand),
    NaturalLanguage(String),
    UnknownSlash { input: String, available: Vec<&'static str> },
}

const AVAILABLE: &[&str] = &["help", "status", "pause", "resume", "stop", "send-to-implementer", "override-decision"];

/// Standing prompt indicator shown before every input line, naming the
/// current routing target.
pub fn prompt_indicator(project_name: &str) -> String {
    format!("orch:{project_name}> ")
}

pub fn parse_line(line: &str) -> ReplInput {
    let trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix('/') {
        return parse_slash(rest);
    }
    ReplInput::NaturalLanguage(trimmed.to_string())
}

fn parse_slash(rest: &str) -> ReplInput {
    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or("").to_lowercase();
    let arg = parts.next().unwrap_or("").trim();

    match command.as_str() {
        "help" => ReplInput::Slash(SlashCommand::Help),
        "status" => ReplInput::Slash(SlashCommand::Status),
        "pause" => ReplInput::Slash(SlashCommand::Pause),
        "resume" => ReplInput::Slash(SlashCommand::Resume),
        "stop" => ReplInput::Slash(SlashCommand::Stop),
        "send-to-implementer" => ReplInput::Slash(SlashCommand::SendToImplementer(arg.to_string())),
        "override-decision" => match Override::parse(arg) {
            Some(o) => ReplInput::Slash(SlashCommand::OverrideDecision(o)),
            None => ReplInput::UnknownSlash { input: format!("/{rest}"), available: AVAILABLE.to_vec() },
        },
        _ => ReplInput::UnknownSlash { input: format!("/{rest}"), available: AVAILABLE.to_vec() },
    }
}

/// Tab completion is restricted to slash commands.
pub fn complete(partial: &str) -> Vec<&'static str> {
    let Some(rest) = partial.strip_prefix('/') else {
        return Vec::new();
    };
    let rest = rest.to_lowercase();
    AVAILABLE.iter().copied().filter(|c| c.starts_with(rest.as_str())).collect()
}
