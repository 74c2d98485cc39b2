/// Longest comment the test-management service stores.
pub const MAX_COMMENT_LENGTH: usize = 2048;

/// Returns the first `MAX_COMMENT_LENGTH` characters of `text`.
pub fn truncate_comment(text: &str) -> String {
    truncate_chars(text, MAX_COMMENT_LENGTH)
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_comment_is_unchanged() {
        assert_eq!(truncate_comment("All test steps passed."), "All test steps passed.");
    }

    #[test]
    fn long_comment_keeps_exactly_the_first_2048_chars() {
        let long: String = (0..5000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let truncated = truncate_comment(&long);
        assert_eq!(truncated.chars().count(), MAX_COMMENT_LENGTH);
        assert_eq!(truncated, long[..MAX_COMMENT_LENGTH]);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "é".repeat(3000);
        let truncated = truncate_comment(&text);
        assert_eq!(truncated.chars().count(), MAX_COMMENT_LENGTH);
        assert_eq!(truncated.len(), MAX_COMMENT_LENGTH * 2);
    }

    #[test]
    fn boundary_length_is_kept_whole() {
        let exact = "x".repeat(MAX_COMMENT_LENGTH);
        assert_eq!(truncate_comment(&exact), exact);
    }
}
