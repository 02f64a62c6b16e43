//! Shared utility functions used across the codebase.

/// Truncate `text` to at most `max` characters, appending `…` when cut.
///
/// Counts characters, not bytes, so multi-byte input never splits a code point.
pub fn shorten(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}…", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Read an environment-style value, treating blank strings as unset.
pub fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorten_keeps_short_text() {
        assert_eq!(shorten("hello", 5), "hello");
        assert_eq!(shorten("", 3), "");
    }

    #[test]
    fn shorten_cuts_on_char_boundary() {
        assert_eq!(shorten("hello world", 5), "hello…");
        assert_eq!(shorten("ééééé", 2), "éé…");
    }

    #[test]
    fn collapse_whitespace_joins_runs() {
        assert_eq!(collapse_whitespace("  rg   -n\tfoo\n src "), "rg -n foo src");
    }

    #[test]
    fn non_blank_filters_whitespace_values() {
        let lookup = |key: &str| match key {
            "SET" => Some("value".to_string()),
            "BLANK" => Some("   ".to_string()),
            _ => None,
        };
        assert_eq!(non_blank(&lookup, "SET").as_deref(), Some("value"));
        assert_eq!(non_blank(&lookup, "BLANK"), None);
        assert_eq!(non_blank(&lookup, "MISSING"), None);
    }
}
