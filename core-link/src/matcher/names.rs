//! Name normalization and fuzzy name similarity.
//!
//! Names coming from different services disagree on accents, punctuation,
//! casing and edition suffixes ("Deluxe", "feat. X", "25th Anniversary").
//! Everything here compares names after folding them to uppercase ASCII
//! tokens.

use std::collections::HashSet;

use any_ascii::any_ascii;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Tokens that start a decoration rather than the name itself.
const SUFFIX_TOKENS: &[&str] = &["FEAT", "FT", "DELUXE", "EDITION", "MIXTAPE"];

const MAX_EDIT_RATIO: f64 = 0.3;
const MIN_TOKEN_OVERLAP: f64 = 0.75;

const SIMILAR_NAME: f64 = 0.8;
const OVERLAPPING_NAME: f64 = 0.7;

/// Fold a name to space-separated uppercase ASCII alphanumeric tokens.
///
/// Accents are stripped through canonical decomposition before
/// transliteration, so "Beyoncé" and "BEYONCE" normalize identically.
pub fn normalize(name: &str) -> String {
    let folded: String = name.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let ascii = any_ascii(&folded);

    let mut normalized = String::with_capacity(ascii.len());
    for token in ascii
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        if !normalized.is_empty() {
            normalized.push(' ');
        }
        normalized.push_str(&token.to_ascii_uppercase());
    }
    normalized
}

/// Similarity of two names in `[0, 1]`.
///
/// Exactly 1.0 only when the names are equal ignoring case or equal after
/// normalization.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    if a.to_lowercase() == b.to_lowercase() {
        return 1.0;
    }

    let a = normalize(a);
    let b = normalize(b);
    if a == b {
        return 1.0;
    }

    let a_tokens: Vec<&str> = a.split(' ').filter(|t| !t.is_empty()).collect();
    let b_tokens: Vec<&str> = b.split(' ').filter(|t| !t.is_empty()).collect();

    if shares_prefix_before_suffix(&a_tokens, &b_tokens) {
        return SIMILAR_NAME;
    }

    let longest = a.chars().count().max(b.chars().count());
    if longest > 0 {
        let ratio = strsim::levenshtein(&a, &b) as f64 / longest as f64;
        if ratio < MAX_EDIT_RATIO {
            return SIMILAR_NAME;
        }
    }

    if token_jaccard(&a_tokens, &b_tokens) >= MIN_TOKEN_OVERLAP {
        return OVERLAPPING_NAME;
    }

    0.0
}

/// Jaccard overlap of two artist lists, comparing normalized names.
pub fn artist_overlap(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<String> = a.iter().map(|n| normalize(n)).collect();
    let b: HashSet<String> = b.iter().map(|n| normalize(n)).collect();
    jaccard(&a, &b)
}

/// "THRILLER" vs "THRILLER 25TH ANNIVERSARY": the names agree on at least one
/// leading token and the first disagreeing token on either side opens a
/// decoration.
fn shares_prefix_before_suffix(a: &[&str], b: &[&str]) -> bool {
    let matched = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    if matched == 0 {
        return false;
    }

    [a.get(matched), b.get(matched)]
        .into_iter()
        .flatten()
        .any(|token| is_suffix_token(token))
}

fn is_suffix_token(token: &str) -> bool {
    if SUFFIX_TOKENS.contains(&token) {
        return true;
    }
    // ordinals: 10TH, 25TH
    match token.strip_suffix("TH") {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

fn token_jaccard(a: &[&str], b: &[&str]) -> f64 {
    let a: HashSet<&str> = a.iter().copied().collect();
    let b: HashSet<&str> = b.iter().copied().collect();
    jaccard(&a, &b)
}

fn jaccard<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
