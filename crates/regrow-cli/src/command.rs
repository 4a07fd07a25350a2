//! Line commands understood by `regrow-play`.

use thiserror::Error;

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayCommand {
    Login(String),
    Logout,
    Water,
    Fertilize,
    Reset,
    Status,
    Dismiss,
    Help,
    Quit,
}

/// Why a line could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("{0} requires a {1} argument")]
    MissingArgument(&'static str, &'static str),

    #[error("{0} takes no arguments")]
    UnexpectedArgument(&'static str),

    #[error("Unknown command: {0}")]
    Unknown(String),
}

impl PlayCommand {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Result<Self, CommandError>> {
        let mut words = line.split_whitespace();
        let name = words.next()?;
        let arg = words.next();

        let no_args = |cmd: Self, label: &'static str| match arg {
            Some(_) => Err(CommandError::UnexpectedArgument(label)),
            None => Ok(cmd),
        };

        let parsed = match name.to_ascii_lowercase().as_str() {
            "login" => match arg {
                Some(user) if words.next().is_none() => Ok(Self::Login(user.to_string())),
                Some(_) => Err(CommandError::UnexpectedArgument("login")),
                None => Err(CommandError::MissingArgument("login", "user")),
            },
            "logout" => no_args(Self::Logout, "logout"),
            "water" | "w" => no_args(Self::Water, "water"),
            "fertilize" | "f" => no_args(Self::Fertilize, "fertilize"),
            "reset" => no_args(Self::Reset, "reset"),
            "status" | "s" => no_args(Self::Status, "status"),
            "dismiss" => no_args(Self::Dismiss, "dismiss"),
            "help" | "h" | "?" => no_args(Self::Help, "help"),
            "quit" | "exit" | "q" => no_args(Self::Quit, "quit"),
            other => Err(CommandError::Unknown(other.to_string())),
        };
        Some(parsed)
    }
}

pub fn print_usage() {
    println!("regrow-play - Grow a tree");
    println!();
    println!("Commands:");
    println!("  login <user>   Sign in and load saved progress");
    println!("  logout         Sign out (guest view, nothing saved)");
    println!("  water, w       Spend 5 coins for +10% growth");
    println!("  fertilize, f   Spend 10 coins for +20% growth");
    println!("  reset          Start a new tree");
    println!("  status, s      Show current progress");
    println!("  dismiss        Close the completion notice");
    println!("  help           Show this help");
    println!("  quit           Save and exit");
    println!();
    println!("Environment:");
    println!("  REGROW_API_BASE     Progress server URL (default: in-memory store)");
    println!("  REGROW_CACHE_PATH   Local cache file (default: ./regrow-cache.json)");
    println!("  REGROW_SAVE_DELAY_MS  Save debounce delay (default: 500)");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_aliases() {
        assert_eq!(PlayCommand::parse("water"), Some(Ok(PlayCommand::Water)));
        assert_eq!(PlayCommand::parse("  F  "), Some(Ok(PlayCommand::Fertilize)));
        assert_eq!(
            PlayCommand::parse("login kim"),
            Some(Ok(PlayCommand::Login("kim".into())))
        );
        assert_eq!(PlayCommand::parse("exit"), Some(Ok(PlayCommand::Quit)));
    }

    #[test]
    fn blank_line_is_none() {
        assert_eq!(PlayCommand::parse("   "), None);
    }

    #[test]
    fn argument_errors() {
        assert_eq!(
            PlayCommand::parse("login"),
            Some(Err(CommandError::MissingArgument("login", "user")))
        );
        assert_eq!(
            PlayCommand::parse("login kim lee"),
            Some(Err(CommandError::UnexpectedArgument("login")))
        );
        assert_eq!(
            PlayCommand::parse("water twice"),
            Some(Err(CommandError::UnexpectedArgument("water")))
        );
        assert_eq!(
            PlayCommand::parse("prune"),
            Some(Err(CommandError::Unknown("prune".into())))
        );
    }
}
