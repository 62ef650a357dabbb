//! Deterministic keyword scoring
//!
//! Query and document text are lowercased and split on anything that is not
//! alphanumeric. A document's score is the number of distinct query tokens it
//! contains. Results are ordered by descending score; equal scores keep corpus
//! insertion order, so identical inputs always yield identical output.

use super::{Document, Match};
use std::collections::HashSet;

/// Excerpt length used when no limit is configured
pub const DEFAULT_EXCERPT_CHARS: usize = 800;

/// Lowercased alphanumeric tokens in order of appearance
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Search `documents` for `query`, returning at most `max_results` matches
pub fn search(documents: &[Document], query: &str, max_results: usize) -> Vec<Match> {
    search_with_excerpt_limit(documents, query, max_results, DEFAULT_EXCERPT_CHARS)
}

/// Same as [`search`] with an explicit excerpt length in characters
pub fn search_with_excerpt_limit(
    documents: &[Document],
    query: &str,
    max_results: usize,
    max_excerpt_chars: usize,
) -> Vec<Match> {
    if max_results == 0 || documents.is_empty() {
        return Vec::new();
    }

    let mut query_tokens = tokenize(query);
    let mut seen = HashSet::new();
    query_tokens.retain(|token| seen.insert(token.clone()));
    if query_tokens.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &Document)> = documents
        .iter()
        .filter_map(|document| {
            let tokens: HashSet<String> = tokenize(&document.text).into_iter().collect();
            let score = query_tokens.iter().filter(|t| tokens.contains(*t)).count();
            (score > 0).then_some((score, document))
        })
        .collect();

    // sort_by is stable: ties stay in insertion order
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .take(max_results)
        .map(|(score, document)| Match {
            document_id: document.id.clone(),
            title: document.title.clone(),
            excerpt: excerpt(&document.text, max_excerpt_chars),
            score,
        })
        .collect()
}

/// Trimmed text cut to `max_chars` characters, marked with "..." when cut
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("vpn", "To connect to the VPN, open the client and sign in."),
            Document::new("printer", "Printer jams: open tray 2 and remove the paper."),
            Document::new("password", "Reset your password from the self-service portal."),
        ]
    }

    #[test]
    fn test_tokenize_strips_punctuation_and_case() {
        assert_eq!(
            tokenize("Can't connect to VPN!!"),
            vec!["can", "t", "connect", "to", "vpn"]
        );
        assert!(tokenize("  ... ").is_empty());
    }

    #[test]
    fn test_empty_corpus_returns_nothing() {
        assert!(search(&[], "vpn", 3).is_empty());
    }

    #[test]
    fn test_no_matching_token_returns_nothing() {
        assert!(search(&corpus(), "kubernetes", 3).is_empty());
    }

    #[test]
    fn test_zero_max_results_returns_nothing() {
        assert!(search(&corpus(), "vpn", 0).is_empty());
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let matches = search(&corpus(), "open", 3);
        let ids: Vec<&str> = matches.iter().map(|m| m.document_id.as_str()).collect();
        assert_eq!(ids, vec!["vpn", "printer"]);
        assert!(matches.iter().all(|m| m.score == 1));
    }

    #[test]
    fn test_repeated_query_tokens_count_once() {
        let matches = search(&corpus(), "vpn vpn VPN", 3);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].score, 1);
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        assert_eq!(excerpt("héllo wörld", 5), "héllo...");
        assert_eq!(excerpt("short", 10), "short");
    }

    #[test]
    fn test_excerpt_limit_applies_to_matches() {
        let matches = search_with_excerpt_limit(&corpus(), "password", 1, 10);
        assert_eq!(matches[0].excerpt, "Reset your...");
    }
}
