//! Query normalization for exact-match cache keys (spec §4.10.1): lowercase,
//! collapse whitespace, strip leading/trailing punctuation.

/// Normalize a raw query string for exact-match cache keying.
pub fn normalize_query(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let collapsed = lower.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_string()
}

/// `cache:exact:{user_type}:{md5(query_normalized)}`.
pub fn exact_key(user_type: &str, normalized_query: &str) -> String {
    format!("cache:exact:{}:{:x}", user_type, md5::compute(normalized_query))
}

pub fn exact_meta_key(user_type: &str, normalized_query: &str) -> String {
    format!("{}:meta", exact_key(user_type, normalized_query))
}

pub fn semantic_index_key(user_type: &str) -> String {
    format!("semantic_index:{}", user_type)
}

/// `cache:intent:{md5(query_lower)}`.
pub fn intent_key(query_lower: &str) -> String {
    format!("cache:intent:{:x}", md5::compute(query_lower))
}

/// `cache:embedding:{md5(query_raw)}`.
pub fn embedding_key(query_raw: &str) -> String {
    format!("cache:embedding:{:x}", md5::compute(query_raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_whitespace_and_punctuation() {
        assert_eq!(
            normalize_query("  What IS the   Minimum Wage??  "),
            "what is the minimum wage"
        );
    }

    #[test]
    fn all_punctuation_query_normalizes_to_empty() {
        assert_eq!(normalize_query("???!!!"), "");
    }

    #[test]
    fn unicode_whitespace_is_collapsed() {
        let raw = "what\u{00A0}about\u{2003}notice";
        let normalized = normalize_query(raw);
        assert!(!normalized.contains('\u{00A0}'));
    }

    #[test]
    fn exact_key_is_stable_for_identical_input() {
        let a = exact_key("citizen", &normalize_query("Hello there"));
        let b = exact_key("citizen", &normalize_query("  Hello   there  "));
        assert_eq!(a, b);
    }
}
