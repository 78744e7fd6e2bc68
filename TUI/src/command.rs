use crate::action::Action;

pub struct CommandParser;

impl CommandParser {
    pub fn parse(input: &str) -> Result<Action, String> {
        let input = input.trim();
        if !input.starts_with('/') {
            return Err("Not a command".to_string());
        }

        let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
        let args = args.trim();

        match cmd {
            "/help" => Ok(Action::Help),
            "/clear" => Ok(Action::Clear),
            "/raw" => Ok(Action::ToggleRawMarkdown),
            "/copy" => Ok(Action::CopyNarrative),
            "/endpoint" => {
                if args.is_empty() {
                    Ok(Action::ShowEndpoint)
                } else {
                    Err("The endpoint is fixed for this session; restart with --api-url <url> to change it.".to_string())
                }
            }
            "/quit" => Ok(Action::Quit),
            _ => Err(format!("Unknown command: {}. Type /help for available commands.", cmd)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(CommandParser::parse("/help"), Ok(Action::Help));
        assert_eq!(CommandParser::parse("  /clear "), Ok(Action::Clear));
        assert_eq!(CommandParser::parse("/raw"), Ok(Action::ToggleRawMarkdown));
        assert_eq!(CommandParser::parse("/copy"), Ok(Action::CopyNarrative));
        assert_eq!(CommandParser::parse("/endpoint"), Ok(Action::ShowEndpoint));
        assert_eq!(CommandParser::parse("/quit"), Ok(Action::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!(CommandParser::parse("GDP of India").is_err());
        assert!(CommandParser::parse("/endpoint http://x").is_err());
        let err = CommandParser::parse("/plot").unwrap_err();
        assert!(err.contains("/plot"));
    }
}
