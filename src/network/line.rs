//! Just enough line handling to drive the bot: split an incoming line into
//! prefix, command and params, and render outbound requests.
//!
//! No tag parsing, no validation.

use crate::events::ProtocolEvent;
use crate::identity::Observation;
use crate::outbound::Outbound;

/// A received line, borrowed from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line<'a> {
    pub prefix: Option<&'a str>,
    pub command: &'a str,
    pub params: Vec<&'a str>,
}

impl<'a> Line<'a> {
    pub fn parse(line: &'a str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        // Message tags are ignored.
        if rest.starts_with('@') {
            rest = rest.split_once(' ').map_or("", |(_, r)| r);
        }

        let prefix = match rest.strip_prefix(':') {
            Some(stripped) => {
                let (prefix, r) = stripped.split_once(' ').unwrap_or((stripped, ""));
                rest = r;
                Some(prefix)
            }
            None => None,
        };

        let rest = rest.trim_start_matches(' ');
        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing);
                break;
            }
            let (param, r) = rest.split_once(' ').unwrap_or((rest, ""));
            params.push(param);
            rest = r;
        }

        Some(Self { prefix, command, params })
    }

    fn param(&self, index: usize) -> Option<&'a str> {
        self.params.get(index).copied()
    }

    fn source(&self) -> Observation {
        Observation::from_source(self.prefix.unwrap_or(""))
    }

    /// Map the line to a protocol event, if it is one the bot cares about.
    pub fn to_event(&self) -> Option<ProtocolEvent> {
        let source = self.source();
        let event = match self.command.to_ascii_uppercase().as_str() {
            "PING" => ProtocolEvent::Ping {
                token: self.param(0).unwrap_or_default().to_string(),
            },
            "PRIVMSG" => ProtocolEvent::Privmsg {
                source,
                target: self.param(0)?.to_string(),
                text: self.param(1).unwrap_or_default().to_string(),
            },
            "NOTICE" => ProtocolEvent::Notice {
                source,
                target: self.param(0)?.to_string(),
                text: self.param(1).unwrap_or_default().to_string(),
            },
            "JOIN" => ProtocolEvent::Join {
                source,
                channel: self.param(0)?.to_string(),
            },
            "PART" => ProtocolEvent::Part {
                source,
                channel: self.param(0)?.to_string(),
                message: self.param(1).map(str::to_string),
            },
            "QUIT" => ProtocolEvent::Quit {
                source,
                message: self.param(0).map(str::to_string),
            },
            "KICK" => ProtocolEvent::Kick {
                source,
                channel: self.param(0)?.to_string(),
                target: self.param(1)?.to_string(),
                message: self.param(2).map(str::to_string),
            },
            "MODE" => ProtocolEvent::Mode {
                source,
                target: self.param(0)?.to_string(),
                mode: self.param(1)?.to_string(),
                args: self.params.iter().skip(2).map(|a| a.to_string()).collect(),
            },
            "NICK" => ProtocolEvent::Nick {
                source,
                new_nick: self.param(0)?.to_string(),
            },
            "TOPIC" => ProtocolEvent::Topic {
                source,
                channel: self.param(0)?.to_string(),
                topic: self.param(1).unwrap_or_default().to_string(),
            },
            "INVITE" => ProtocolEvent::Invite {
                source,
                channel: self.param(1)?.to_string(),
            },
            numeric if numeric.len() == 3 => ProtocolEvent::Numeric {
                code: numeric.parse().ok()?,
                args: self.params.iter().map(|p| p.to_string()).collect(),
            },
            _ => return None,
        };
        Some(event)
    }
}

fn with_trailing(mut line: String, trailing: Option<&str>) -> String {
    if let Some(text) = trailing {
        line.push_str(" :");
        line.push_str(text);
    }
    line
}

/// Render an outbound request as a protocol line. `Connect` has no line.
pub fn encode(outbound: &Outbound) -> Option<String> {
    let line = match outbound {
        Outbound::Connect { .. } => return None,
        Outbound::User { username, realname } => format!("USER {} 0 * :{}", username, realname),
        Outbound::Nick(nick) => format!("NICK {}", nick),
        Outbound::Privmsg { target, text } => format!("PRIVMSG {} :{}", target, text),
        Outbound::Notice { target, text } => format!("NOTICE {} :{}", target, text),
        Outbound::Mode { target, mode, args } => {
            let mut line = format!("MODE {} {}", target, mode);
            for arg in args.iter().filter(|a| !a.is_empty()) {
                line.push(' ');
                line.push_str(arg);
            }
            line
        }
        Outbound::Join { channels, keys } => match keys {
            Some(keys) => format!("JOIN {} {}", channels, keys),
            None => format!("JOIN {}", channels),
        },
        Outbound::Part { channels, message } => with_trailing(format!("PART {}", channels), message.as_deref()),
        Outbound::Invite { nick, channel } => format!("INVITE {} {}", nick, channel),
        Outbound::Kick { channel, nick, comment } => {
            with_trailing(format!("KICK {} {}", channel, nick), comment.as_deref())
        }
        Outbound::Topic { channel, topic } => with_trailing(format!("TOPIC {}", channel), topic.as_deref()),
        Outbound::Ping(token) => format!("PING {}", token),
        Outbound::Pong(token) => format!("PONG :{}", token),
        Outbound::Quit(message) => with_trailing("QUIT".to_string(), message.as_deref()),
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefix_command_and_trailing() {
        let line = Line::parse(":alice!al@home.example PRIVMSG #bots :~greet me please\r\n").unwrap();
        assert_eq!(line.prefix, Some("alice!al@home.example"));
        assert_eq!(line.command, "PRIVMSG");
        assert_eq!(line.params, vec!["#bots", "~greet me please"]);
    }

    #[test]
    fn tags_are_skipped() {
        let line = Line::parse("@time=2024-01-01T00:00:00Z :srv 376 bot :End of MOTD").unwrap();
        assert_eq!(line.prefix, Some("srv"));
        assert_eq!(line.command, "376");
    }

    #[test]
    fn empty_line_is_none() {
        assert!(Line::parse("").is_none());
        assert!(Line::parse("\r\n").is_none());
    }

    #[test]
    fn privmsg_event_carries_observation() {
        let event = Line::parse(":alice!al@home.example PRIVMSG pancakesbot :hello")
            .unwrap()
            .to_event()
            .unwrap();
        assert_eq!(
            event,
            ProtocolEvent::Privmsg {
                source: Observation::new("alice", "al", "home.example"),
                target: "pancakesbot".into(),
                text: "hello".into(),
            }
        );
    }

    #[test]
    fn mode_and_numeric_events() {
        let mode = Line::parse(":op!o@h MODE #bots +o bob").unwrap().to_event().unwrap();
        assert_eq!(
            mode,
            ProtocolEvent::Mode {
                source: Observation::new("op", "o", "h"),
                target: "#bots".into(),
                mode: "+o".into(),
                args: vec!["bob".into()],
            }
        );

        let numeric = Line::parse(":srv 433 * pancakesbot :Nickname is already in use")
            .unwrap()
            .to_event()
            .unwrap();
        assert!(matches!(numeric, ProtocolEvent::Numeric { code: 433, .. }));
    }

    #[test]
    fn ping_and_unknown_commands() {
        assert_eq!(
            Line::parse("PING :irc.example.net").unwrap().to_event(),
            Some(ProtocolEvent::Ping { token: "irc.example.net".into() })
        );
        assert_eq!(Line::parse(":srv CAP * LS :multi-prefix").unwrap().to_event(), None);
    }

    #[test]
    fn encodes_outbound_requests() {
        assert_eq!(
            encode(&Outbound::User { username: "pancakes".into(), realname: "robot".into() }).as_deref(),
            Some("USER pancakes 0 * :robot")
        );
        assert_eq!(
            encode(&Outbound::Kick { channel: "#bots".into(), nick: "bob".into(), comment: Some("bye now".into()) })
                .as_deref(),
            Some("KICK #bots bob :bye now")
        );
        assert_eq!(
            encode(&Outbound::Mode { target: "#bots".into(), mode: "+b".into(), args: vec!["*!*@h".into()] })
                .as_deref(),
            Some("MODE #bots +b *!*@h")
        );
        assert_eq!(encode(&Outbound::Quit(None)).as_deref(), Some("QUIT"));
        assert_eq!(encode(&Outbound::Connect { network: "x".into(), port: 1 }), None);
    }
}
