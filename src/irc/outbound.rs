//! Outbound line builders.

/// Maximum line length the server relays, excluding CRLF.
pub const MAX_LINE_LEN: usize = 510;

/// Source prefix the server prepends when relaying our messages, e.g.
/// `:Bot!~ident@account.users.quakenet.org `.
///
/// Only its length matters: relayed lines must stay within [`MAX_LINE_LEN`].
pub fn relay_prefix(nick: &str, username: &str, host: &str) -> String {
    format!(":{nick}!~{username}@{host} ")
}

/// Build PRIVMSG lines for `text`, splitting on word boundaries so that each
/// relayed line (including `relay_prefix_len`) fits in [`MAX_LINE_LEN`].
///
/// A single word longer than the limit is sent on a line of its own.
pub fn privmsg_lines(relay_prefix_len: usize, target: &str, text: &str) -> Vec<String> {
    let command = format!("PRIVMSG {target} :");
    let room = MAX_LINE_LEN.saturating_sub(relay_prefix_len + command.len());

    let mut chunks: Vec<String> = vec![String::new()];
    for word in text.split(' ').filter(|w| !w.is_empty()) {
        let current = chunks.last_mut().map(|c| c.len()).unwrap_or_default();
        let needed = if current == 0 { word.len() } else { word.len() + 1 };

        if current > 0 && current + needed > room {
            chunks.push(word.to_string());
        } else if let Some(chunk) = chunks.last_mut() {
            if !chunk.is_empty() {
                chunk.push(' ');
            }
            chunk.push_str(word);
        }
    }

    chunks
        .into_iter()
        .map(|chunk| format!("{command}{chunk}"))
        .collect()
}

/// `NOTICE` carrying a CTCP reply.
pub fn ctcp_reply(target: &str, body: &str) -> String {
    format!("NOTICE {target} :\u{1}{body}\u{1}")
}

/// Longest prefix of `text` that fits in `max` bytes without splitting a
/// character.
pub fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// `TOPIC` command, cut to [`MAX_LINE_LEN`].
pub fn topic(channel: &str, text: &str) -> String {
    let command = format!("TOPIC {channel} :");
    let room = MAX_LINE_LEN.saturating_sub(command.len());
    format!("{command}{}", truncate(text, room))
}

/// `NAMES` roster poll.
pub fn names(channel: &str) -> String {
    format!("NAMES {channel}")
}

/// `JOIN` command.
pub fn join(channel: &str) -> String {
    format!("JOIN {channel}")
}

/// `PONG` reply to a server PING.
pub fn pong(token: &str) -> String {
    format!("PONG :{token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_prefix() {
        assert_eq!(
            relay_prefix("Bot", "ident", "acc.users.quakenet.org"),
            ":Bot!~ident@acc.users.quakenet.org "
        );
    }

    #[test]
    fn test_short_message_single_line() {
        assert_eq!(
            privmsg_lines(40, "#ios.mix", "romdi: The position is already taken by you."),
            vec!["PRIVMSG #ios.mix :romdi: The position is already taken by you."]
        );
    }

    #[test]
    fn test_long_message_split_on_words() {
        let text = vec!["word"; 200].join(" ");
        let prefix_len = 40;
        let lines = privmsg_lines(prefix_len, "#ios.mix", &text);

        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.starts_with("PRIVMSG #ios.mix :"));
            assert!(prefix_len + line.len() <= MAX_LINE_LEN);
            assert!(!line.ends_with(' '));
        }
        let rejoined: Vec<&str> = lines
            .iter()
            .map(|l| l.trim_start_matches("PRIVMSG #ios.mix :"))
            .collect();
        assert_eq!(rejoined.join(" "), text);
    }

    #[test]
    fn test_collapses_repeated_spaces() {
        assert_eq!(
            privmsg_lines(0, "#a", "Go  to   server"),
            vec!["PRIVMSG #a :Go to server"]
        );
    }

    #[test]
    fn test_empty_text_yields_empty_message() {
        assert_eq!(privmsg_lines(0, "#a", ""), vec!["PRIVMSG #a :"]);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("romdi", 10), "romdi");
        assert_eq!(truncate("Jörg", 2), "J");
        assert_eq!(truncate("Jörg", 3), "Jö");
    }

    #[test]
    fn test_topic_line_is_capped() {
        let line = topic("#ios.mix", &"x".repeat(2000));
        assert_eq!(line.len(), MAX_LINE_LEN);
        assert!(line.starts_with("TOPIC #ios.mix :xxx"));
    }

    #[test]
    fn test_command_builders() {
        assert_eq!(ctcp_reply("romdi", "PING 123"), "NOTICE romdi :\u{1}PING 123\u{1}");
        assert_eq!(topic("#ios.mix", "[GK]"), "TOPIC #ios.mix :[GK]");
        assert_eq!(names("#ios.mix"), "NAMES #ios.mix");
        assert_eq!(join("#ios.mix"), "JOIN #ios.mix");
        assert_eq!(pong("irc.example.org"), "PONG :irc.example.org");
    }
}
