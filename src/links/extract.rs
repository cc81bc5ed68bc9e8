//! Finding links in chat text.

use url::Url;

/// Characters that commonly trail a link in prose but are not part of it.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '>', '"', '\''];

/// Extract http and https URLs embedded in `text`, in order of appearance.
pub fn extract_urls(text: &str) -> Vec<Url> {
    text.split_whitespace()
        .filter_map(|word| {
            let start = word.find("http://").or_else(|| word.find("https://"))?;
            let candidate = word[start..].trim_end_matches(TRAILING_PUNCTUATION);
            let url = Url::parse(candidate).ok()?;
            matches!(url.scheme(), "http" | "https").then_some(url)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(urls: Vec<Url>) -> Vec<String> {
        urls.into_iter().map(String::from).collect()
    }

    #[test]
    fn test_no_urls() {
        assert!(extract_urls("just chatting").is_empty());
        assert!(extract_urls("ftp://example.org/file").is_empty());
    }

    #[test]
    fn test_multiple_urls_in_order() {
        assert_eq!(
            strs(extract_urls(
                "see https://github.com/romdi/IOS and http://example.org/a?b=c"
            )),
            vec!["https://github.com/romdi/IOS", "http://example.org/a?b=c"]
        );
    }

    #[test]
    fn test_trailing_punctuation_and_wrapping() {
        assert_eq!(
            strs(extract_urls("(https://example.org/page), nice.")),
            vec!["https://example.org/page"]
        );
    }

    #[test]
    fn test_invalid_candidate_skipped() {
        assert!(extract_urls("http://").is_empty());
    }
}
