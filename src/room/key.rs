//! Player identity comparison.
//!
//! Players are compared by a short prefix rather than by exact nickname, so
//! `romdi`, `Romdi` and `romdi|afk` count as the same player. Every
//! "already present" check in the room goes through [`same_player`].

/// Number of leading characters that identify a player.
pub const PREFIX_LEN: usize = 5;

/// Case-preserving short form shown in the topic.
pub fn display_prefix(name: &str) -> &str {
    match name.char_indices().nth(PREFIX_LEN) {
        Some((idx, _)) => &name[..idx],
        None => name,
    }
}

/// Normalized comparison key: lowercase of the first [`PREFIX_LEN`] characters.
pub fn prefix_key(name: &str) -> String {
    display_prefix(name).to_lowercase()
}

/// Whether two identifiers refer to the same player.
pub fn same_player(a: &str, b: &str) -> bool {
    prefix_key(a) == prefix_key(b)
}

/// Exact nickname equality as the server defines it (ASCII case-insensitive).
pub fn same_nick(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefix() {
        assert_eq!(display_prefix("romdi``"), "romdi");
        assert_eq!(display_prefix("Hunki"), "Hunki");
        assert_eq!(display_prefix("abc"), "abc");
        assert_eq!(display_prefix(""), "");
    }

    #[test]
    fn test_display_prefix_multibyte() {
        assert_eq!(display_prefix("Jörgen"), "Jörge");
    }

    #[test]
    fn test_prefix_key_lowercases() {
        assert_eq!(prefix_key("RomDi|afk"), "romdi");
    }

    #[test]
    fn test_same_player() {
        assert!(same_player("romdi", "Romdi``"));
        assert!(same_player("Johnny1337", "johnny"));
        assert!(!same_player("romd", "romdi"));
    }

    #[test]
    fn test_same_nick() {
        assert!(same_nick("IOSBot", "iosbot"));
        assert!(!same_nick("IOSBot", "IOSBot`"));
    }
}
