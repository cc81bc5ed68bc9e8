//! Character decoding for inbound IRC lines.
//!
//! IRC carries raw bytes. Modern clients send UTF-8, older Windows clients
//! still send Windows-1252, so lines that are not valid UTF-8 are decoded as
//! Windows-1252 instead of being mangled with replacement characters.

use encoding_rs::WINDOWS_1252;

/// Decode a raw line received from the server.
///
/// # Examples
///
/// ```
/// use lineupbot::irc::encoding::decode_line;
///
/// assert_eq!(decode_line("Grüße".as_bytes()), "Grüße");
/// assert_eq!(decode_line(b"Gr\xfc\xdfe"), "Grüße");
/// ```
pub fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (decoded, _, _) = WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Strip a trailing LF or CRLF.
pub fn strip_terminator(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    bytes.strip_suffix(b"\r").unwrap_or(bytes)
}
