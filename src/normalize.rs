//! Normalization and equivalence checks for song and artist names.
//!
//! `purify` is the canonical form used for strict queries and for the
//! fallback comparisons. The comparison helpers try a plain
//! case-insensitive check first and only purify when that fails, so
//! well-formed names are never over-normalized.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Words that mark a non-studio variant when they follow a hyphen or an
/// opening parenthesis in a catalog title.
pub static ALTERNATE_VERSION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\blive\b").unwrap(),
        Regex::new(r"(?i)\binstrumental\b").unwrap(),
        Regex::new(r"(?i)\bdemo\b").unwrap(),
        Regex::new(r"(?i)\borchestral\b").unwrap(),
        Regex::new(r"(?i)\bsessions?\b").unwrap(),
        Regex::new(r"(?i)\bacoustic\b").unwrap(),
        Regex::new(r"(?i)\bunplugged\b").unwrap(),
        Regex::new(r"(?i)\brehearsal\b").unwrap(),
        Regex::new(r"(?i)\bremix(?:ed)?\b").unwrap(),
        Regex::new(r"(?i)\bkaraoke\b").unwrap(),
        Regex::new(r"(?i)\bcommentary\b").unwrap(),
        Regex::new(r"(?i)\bouttake\b").unwrap(),
        Regex::new(r"(?i)\bsymphonic\b").unwrap(),
    ]
});

/// Qualifier tail of a title: everything after " - " or an opening bracket.
/// "Enter Sandman - Live in Moscow" → "Live in Moscow"
pub static QUALIFIER_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\s[-–—]\s|[\(\[])(.*)$").unwrap());

/// Leading definite article, as dropped by some catalog entries.
pub static LEADING_ARTICLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^the\s+").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
/// Used to filter out accents during normalization.
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F)
}

/// Expand letters whose conventional ASCII spelling is longer than the
/// base letter. Input must be NFC-composed and lower-cased.
fn expand_locale_letters(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            'ä' => out.push_str("ae"),
            'ö' => out.push_str("oe"),
            'ü' => out.push_str("ue"),
            'ß' => out.push_str("ss"),
            'æ' => out.push_str("ae"),
            'œ' => out.push_str("oe"),
            _ => out.push(c),
        }
    }
    out
}

/// Fold Unicode text to ASCII by applying NFKD decomposition and removing combining marks.
/// e.g., "Beyoncé" → "beyonce", "naïve" → "naive"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    // Letters without a decomposition (ø, ł, đ, ı, Cyrillic, CJK) are transliterated
    any_ascii(&stripped).to_lowercase()
}

/// Straighten curly quotes and accents used as apostrophes, collapse whitespace.
pub fn normalize_punctuation(s: &str) -> String {
    let result = s
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{00B4}', '\u{0060}'], "'");
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Canonical ASCII form of a name: lower-cased, umlauts and sharp-s spelled
/// out ("ö" → "oe", "ß" → "ss"), ligatures expanded, other diacritics
/// dropped, punctuation replaced by spaces, whitespace collapsed.
///
/// Idempotent: the output only contains `[a-z0-9 ]` with single spaces.
pub fn purify(s: &str) -> String {
    let composed: String = s.nfc().collect();
    let expanded = expand_locale_letters(&composed.to_lowercase());
    let folded = fold_to_ascii(&expanded);
    let spaced: String = folded
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Title with a leading "The " removed, if there was one to remove.
pub fn strip_leading_article(title: &str) -> Option<String> {
    let stripped = LEADING_ARTICLE.replace(title, "");
    if stripped.len() == title.len() || stripped.trim().is_empty() {
        None
    } else {
        Some(stripped.into_owned())
    }
}

// ============================================================================
// EQUIVALENCE CHECKS
// ============================================================================

/// Case-insensitive equality, no purification.
pub fn equals_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Whether `haystack` contains `needle`, case-insensitively, or failing
/// that after purifying both.
pub fn contains_normalized(haystack: &str, needle: &str) -> bool {
    if needle.trim().is_empty() {
        return false;
    }
    if haystack.to_lowercase().contains(&needle.to_lowercase()) {
        return true;
    }
    let needle = purify(needle);
    !needle.is_empty() && purify(haystack).contains(&needle)
}

/// Whether one name is a prefix of the other, case-insensitively, or
/// failing that after purifying both. Empty names never match.
pub fn starts_contained_normalized(a: &str, b: &str) -> bool {
    if a.trim().is_empty() || b.trim().is_empty() {
        return false;
    }
    let (a_lower, b_lower) = (a.to_lowercase(), b.to_lowercase());
    if a_lower.starts_with(&b_lower) || b_lower.starts_with(&a_lower) {
        return true;
    }
    let (a_pure, b_pure) = (purify(a), purify(b));
    if a_pure.is_empty() || b_pure.is_empty() {
        return false;
    }
    a_pure.starts_with(&b_pure) || b_pure.starts_with(&a_pure)
}

/// Flags `candidate_title` as a live/instrumental/demo/... variant when a
/// marker word follows a hyphen or parenthesis, unless `source_title`
/// already asks for that same variant.
///
/// "Creeping Death - Live" vs "Creeping Death" → true
/// "Creeping Death (Live)" vs "Creeping Death (Live)" → false
pub fn is_alternate_version_marker(candidate_title: &str, source_title: &str) -> bool {
    let Some(qualifier) = QUALIFIER_SUFFIX
        .captures(candidate_title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
    else {
        return false;
    };
    ALTERNATE_VERSION_PATTERNS
        .iter()
        .any(|p| p.is_match(qualifier) && !p.is_match(source_title))
}

// ============================================================================
// TESTS
// ============================================================================
