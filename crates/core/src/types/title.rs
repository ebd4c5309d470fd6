//! Article-agnostic title ordering.
//!
//! Report sections are sorted by title the way a bookseller shelves:
//! "The Food of Sichuan" files under F, not T. The key is Unicode
//! canonical decomposition (so "Éloge" and "Eloge" collate together),
//! lowercased, with a single leading English article stripped.

use unicode_normalization::UnicodeNormalization;

/// Leading articles stripped before comparison, checked in order.
const LEADING_ARTICLES: &[&str] = &["the ", "a ", "an "];

/// Build the sort key for a product title.
///
/// This affects presentation order only; it plays no part in bucket
/// classification.
#[must_use]
pub fn sort_key(title: &str) -> String {
    let normalized: String = title.trim().nfd().collect::<String>().to_lowercase();
    for article in LEADING_ARTICLES {
        if let Some(rest) = normalized.strip_prefix(article) {
            return rest.to_string();
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_leading_the() {
        assert_eq!(sort_key("The Food of Sichuan"), "food of sichuan");
    }

    #[test]
    fn test_strips_leading_a_and_an() {
        assert_eq!(sort_key("A Cook's Tour"), "cook's tour");
        assert_eq!(sort_key("An Everlasting Meal"), "everlasting meal");
    }

    #[test]
    fn test_only_one_article_is_stripped() {
        // "An " is stripped; the following "A" survives.
        assert_eq!(sort_key("An A-Z of Pasta"), "a-z of pasta");
    }

    #[test]
    fn test_article_requires_trailing_space() {
        assert_eq!(sort_key("Theodora"), "theodora");
        assert_eq!(sort_key("Another Round"), "another round");
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(sort_key("THE NOMA GUIDE"), sort_key("The Noma Guide"));
    }

    #[test]
    fn test_canonical_decomposition() {
        // Composed and decomposed forms of é produce the same key.
        assert_eq!(sort_key("caf\u{e9}"), sort_key("cafe\u{301}"));
    }
}
