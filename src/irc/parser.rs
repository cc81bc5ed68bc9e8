//! IRC line parser.
//!
//! Maps a single raw protocol line to a typed [`Event`]. Lines that do not
//! match any known shape yield `None`; parsing never fails.

/// A typed inbound protocol event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Three-digit server reply.
    NumericReply {
        code: u16,
        /// Target nickname (the token after `*` for pre-registration replies).
        target: String,
        /// Everything after the target.
        payload: String,
    },
    /// Message to a channel or to the bot.
    Privmsg {
        source: String,
        ident: String,
        host: String,
        target: String,
        text: String,
    },
    /// Topic change.
    Topic {
        source: String,
        channel: String,
        text: String,
    },
    /// A user joined a channel.
    Join { source: String, channel: String },
    /// A user left a channel.
    Part { source: String, channel: String },
    /// A user was kicked from a channel.
    Kick {
        source: String,
        channel: String,
        victim: String,
    },
    /// A user disconnected.
    Quit { source: String },
    /// A user changed nickname.
    NickChange { old: String, new: String },
    /// Channel operator/voice mode change.
    ModeChange {
        channel: String,
        modes: String,
        nicks: Vec<String>,
    },
    /// The bot (or someone) was invited to a channel.
    Invite { nick: String, channel: String },
    /// Server keep-alive.
    Ping { token: String },
    /// CTCP PING request.
    CtcpPing { source: String, token: String },
    /// CTCP VERSION request.
    CtcpVersion { source: String },
}

/// CTCP delimiter.
const CTCP: char = '\u{1}';

/// A `nick!ident@host` source prefix.
struct UserMask<'a> {
    nick: &'a str,
    ident: &'a str,
    host: &'a str,
}

fn parse_mask(prefix: &str) -> Option<UserMask<'_>> {
    let (nick, rest) = prefix.split_once('!')?;
    let (ident, host) = rest.split_once('@')?;
    if nick.is_empty() || ident.is_empty() || host.is_empty() {
        return None;
    }
    Some(UserMask { nick, ident, host })
}

/// Split off the next space-delimited token.
fn next_token(s: &str) -> (&str, &str) {
    match s.split_once(' ') {
        Some((head, tail)) => (head, tail),
        None => (s, ""),
    }
}

/// Strip the leading `:` of a trailing parameter.
fn trailing(s: &str) -> &str {
    s.strip_prefix(':').unwrap_or(s)
}

/// Parse one raw line (CR/LF already stripped or not) into an event.
///
/// Keywords match case-insensitively; nick and channel content is kept as-is.
pub fn parse_line(line: &str) -> Option<Event> {
    let line = line.trim_end_matches(['\r', '\n']);

    let (head, rest) = next_token(line);
    if head.eq_ignore_ascii_case("PING") {
        let token = trailing(rest);
        if token.is_empty() {
            return None;
        }
        return Some(Event::Ping {
            token: token.to_string(),
        });
    }

    let prefix = head.strip_prefix(':')?;
    if prefix.is_empty() {
        return None;
    }
    let (command, args) = next_token(rest);

    if command.len() == 3 && command.bytes().all(|b| b.is_ascii_digit()) {
        return parse_numeric(command, args);
    }

    let command = command.to_ascii_uppercase();
    match command.as_str() {
        "MODE" => parse_mode(args),
        "INVITE" => {
            let (nick, channel) = next_token(args);
            let channel = trailing(channel);
            if nick.is_empty() || channel.is_empty() {
                return None;
            }
            Some(Event::Invite {
                nick: nick.to_string(),
                channel: channel.to_string(),
            })
        }
        _ => parse_user_command(parse_mask(prefix)?, &command, args),
    }
}

fn parse_numeric(code: &str, args: &str) -> Option<Event> {
    let code = code.parse().ok()?;
    let (mut target, mut payload) = next_token(args);
    if target == "*" {
        (target, payload) = next_token(payload);
    }
    if target.is_empty() {
        return None;
    }
    Some(Event::NumericReply {
        code,
        target: target.to_string(),
        payload: payload.to_string(),
    })
}

fn parse_mode(args: &str) -> Option<Event> {
    let (channel, rest) = next_token(args);
    let (modes, nicks) = next_token(rest);
    let valid_modes = !modes.is_empty()
        && modes
            .chars()
            .all(|c| matches!(c, '+' | '-' | 'o' | 'v'));
    let nicks: Vec<String> = nicks.split_whitespace().map(str::to_string).collect();
    if channel.is_empty() || !valid_modes || nicks.is_empty() {
        return None;
    }
    Some(Event::ModeChange {
        channel: channel.to_string(),
        modes: modes.to_string(),
        nicks,
    })
}

fn parse_user_command(mask: UserMask<'_>, command: &str, args: &str) -> Option<Event> {
    let source = mask.nick.to_string();
    match command {
        "QUIT" => Some(Event::Quit { source }),
        "NICK" => {
            let new = trailing(args.trim());
            if new.is_empty() {
                return None;
            }
            Some(Event::NickChange {
                old: source,
                new: new.to_string(),
            })
        }
        "PRIVMSG" => {
            let (target, text) = next_token(args);
            if target.is_empty() {
                return None;
            }
            let text = trailing(text);
            if let Some(ctcp) = text
                .strip_prefix(CTCP)
                .and_then(|t| t.strip_suffix(CTCP))
            {
                let (verb, token) = next_token(ctcp);
                if verb.eq_ignore_ascii_case("PING") && !token.is_empty() {
                    return Some(Event::CtcpPing {
                        source,
                        token: token.to_string(),
                    });
                }
                if verb.eq_ignore_ascii_case("VERSION") && token.is_empty() {
                    return Some(Event::CtcpVersion { source });
                }
            }
            Some(Event::Privmsg {
                source,
                ident: mask.ident.to_string(),
                host: mask.host.to_string(),
                target: target.to_string(),
                text: text.to_string(),
            })
        }
        "TOPIC" => {
            let (channel, text) = next_token(args);
            if channel.is_empty() {
                return None;
            }
            Some(Event::Topic {
                source,
                channel: channel.to_string(),
                text: trailing(text).to_string(),
            })
        }
        "JOIN" => {
            let (channel, _) = next_token(trailing(args));
            if channel.is_empty() {
                return None;
            }
            Some(Event::Join {
                source,
                channel: channel.to_string(),
            })
        }
        "PART" => {
            let (channel, _) = next_token(args);
            let channel = trailing(channel);
            if channel.is_empty() {
                return None;
            }
            Some(Event::Part {
                source,
                channel: channel.to_string(),
            })
        }
        "KICK" => {
            let (channel, rest) = next_token(args);
            let (victim, _) = next_token(rest);
            if channel.is_empty() || victim.is_empty() {
                return None;
            }
            Some(Event::Kick {
                source,
                channel: channel.to_string(),
                victim: victim.to_string(),
            })
        }
        _ => None,
    }
}

/// Split a `<channel> :<text>` payload (RPL_TOPIC).
pub fn split_topic_payload(payload: &str) -> Option<(&str, &str)> {
    let (channel, text) = next_token(payload);
    if channel.is_empty() {
        return None;
    }
    Some((channel, trailing(text)))
}

/// Split a `<type> <channel> :<names>` payload (RPL_NAMREPLY).
pub fn split_names_payload(payload: &str) -> Option<(&str, Vec<&str>)> {
    let (kind, rest) = next_token(payload);
    if !matches!(kind, "=" | "*" | "@") {
        return None;
    }
    let (channel, names) = next_token(rest);
    if channel.is_empty() {
        return None;
    }
    Some((channel, trailing(names).split_whitespace().collect()))
}

/// Split a `<channel> :End of /NAMES list.` payload (RPL_ENDOFNAMES).
pub fn split_end_of_names_payload(payload: &str) -> Option<&str> {
    let (channel, _) = next_token(payload);
    (!channel.is_empty()).then_some(channel)
}
