//! Input-preprocessing helpers.

use unicode_segmentation::UnicodeSegmentation;

/// Splits text into extended grapheme clusters, for seeding a token buffer
/// where one user-perceived character should become one token.
pub fn split_graphemes(text: &str) -> Vec<&str> {
    text.graphemes(true).collect()
}

/// Maps a code-point index (the unit token spans are measured in) to the
/// byte offset diagnostics need. Clamps to the end of the source.
pub fn byte_offset(source: &str, codepoint_index: usize) -> usize {
    source
        .char_indices()
        .nth(codepoint_index)
        .map_or(source.len(), |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_graphemes_keeps_clusters_together() {
        assert_eq!(split_graphemes("ab"), vec!["a", "b"]);
        // A combining acute accent stays attached to its base letter.
        assert_eq!(split_graphemes("e\u{301}x"), vec!["e\u{301}", "x"]);
    }

    #[test]
    fn test_byte_offset_multibyte() {
        let s = "aé€b";
        assert_eq!(byte_offset(s, 0), 0);
        assert_eq!(byte_offset(s, 1), 1);
        assert_eq!(byte_offset(s, 2), 3);
        assert_eq!(byte_offset(s, 3), 6);
        assert_eq!(byte_offset(s, 4), 7);
        assert_eq!(byte_offset(s, 99), 7);
    }
}
