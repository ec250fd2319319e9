//! Command parsing for slash commands
//!
//! Commands are matched case-insensitively. A `@botname` suffix is accepted
//! only when it names this bot, so commands meant for other bots in the same
//! group are left alone.

/// A recognized command with its raw argument text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// `/filter` or `/add`
    AddFilter(String),
    /// `/viewfilters` or `/filters`
    ViewFilters,
    /// `/del`
    DeleteFilter(String),
    Connect,
    Disconnect,
    Balance,
    Grant(String),
}

/// Parse `text` as a command addressed to `bot_username`
pub fn parse_command(text: &str, bot_username: &str) -> Option<Command> {
    let text = text.trim_start();
    let rest = text.strip_prefix('/')?;

    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };

    let name = match head.split_once('@') {
        Some((name, target)) => {
            if !target.eq_ignore_ascii_case(bot_username) {
                return None;
            }
            name
        }
        None => head,
    };

    let command = match name.to_lowercase().as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        "filter" | "add" => Command::AddFilter(args.to_string()),
        "viewfilters" | "filters" => Command::ViewFilters,
        "del" => Command::DeleteFilter(args.to_string()),
        "connect" => Command::Connect,
        "disconnect" => Command::Disconnect,
        "balance" => Command::Balance,
        "grant" => Command::Grant(args.to_string()),
        _ => return None,
    };
    Some(command)
}

/// Parse `/grant` arguments: `<user_id> <amount>`
pub fn parse_grant_args(args: &str) -> Option<(i64, i64)> {
    let mut parts = args.split_whitespace();
    let user_id = parts.next()?.parse().ok()?;
    let amount = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((user_id, amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_command("/filter hello world", "MyBot"),
            Some(Command::AddFilter("hello world".to_string()))
        );
        assert_eq!(
            parse_command("/ADD@mybot  \"a b\" reply", "MyBot"),
            Some(Command::AddFilter("\"a b\" reply".to_string()))
        );
        assert_eq!(parse_command("/filters", "MyBot"), Some(Command::ViewFilters));
        assert_eq!(
            parse_command("/del", "MyBot"),
            Some(Command::DeleteFilter(String::new()))
        );
        assert_eq!(parse_command("/balance", "MyBot"), Some(Command::Balance));
    }

    #[test]
    fn test_ignores_other_bots_and_plain_text() {
        assert_eq!(parse_command("/filter@OtherBot x", "MyBot"), None);
        assert_eq!(parse_command("filter x", "MyBot"), None);
        assert_eq!(parse_command("/unknown", "MyBot"), None);
    }

    #[test]
    fn test_parse_grant_args() {
        assert_eq!(parse_grant_args("12345 10"), Some((12345, 10)));
        assert_eq!(parse_grant_args("12345 -2"), Some((12345, -2)));
        assert_eq!(parse_grant_args("12345"), None);
        assert_eq!(parse_grant_args("abc 10"), None);
        assert_eq!(parse_grant_args("1 2 3"), None);
    }
}
