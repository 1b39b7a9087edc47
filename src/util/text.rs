//! Text cleanup for upstream descriptions.

/// Replace every run of whitespace (including form feeds and line breaks) with
/// a single space and trim both ends.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::collapse_whitespace;

    #[test]
    fn collapses_mixed_whitespace() {
        assert_eq!(
            collapse_whitespace("   Test\r\nof a weird \u{c}    description"),
            "Test of a weird description"
        );
    }

    #[test]
    fn empty_and_blank_become_empty() {
        assert_eq!(collapse_whitespace(""), "");
        assert_eq!(collapse_whitespace(" \n\t "), "");
    }
}
