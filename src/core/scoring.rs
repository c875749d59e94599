//! Lexical overlap scoring
//!
//! A cheap approximate-match heuristic used by
//! [`MemoryTree::find_best_match`](super::tree::MemoryTree::find_best_match).
//! It counts shared whitespace-delimited tokens and knows nothing about
//! meaning; semantic judgments belong to the oracles.

use std::collections::HashSet;

/// Scores must be strictly above this to be reported
pub const MATCH_THRESHOLD: f64 = 0.3;

/// Maximum number of best-match results
pub const MAX_MATCHES: usize = 3;

/// Comparison strings shorter than this (in chars) always score 0
const MIN_TARGET_CHARS: usize = 2;

/// Fraction of query tokens that also occur in `target`.
///
/// Both sides are lowercased. The numerator counts distinct shared tokens,
/// the denominator counts every query token (at least 1).
pub fn overlap_score(query: &str, target: &str) -> f64 {
    let query = query.to_lowercase();
    let target = target.to_lowercase();

    if target.chars().count() < MIN_TARGET_CHARS {
        return 0.0;
    }

    let query_tokens: Vec<&str> = query.split_whitespace().collect();
    let target_tokens: HashSet<&str> = target.split_whitespace().collect();

    let shared = query_tokens
        .iter()
        .copied()
        .collect::<HashSet<&str>>()
        .intersection(&target_tokens)
        .count();

    shared as f64 / query_tokens.len().max(1) as f64
}
