//! Bank-account-number canonicalization and name normalization.

use once_cell::sync::Lazy;
use regex::Regex;

static BANK_NUMBER_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+-\d+-\d+-\d+$").unwrap());

/// Canonical group widths for a bank account number: `{2, 4, 7, 3}`.
const GROUP_WIDTHS: [usize; 4] = [2, 4, 7, 3];

/// Canonicalize a bank account number into four dash-separated groups
/// zero-padded to widths `{2, 4, 7, 3}`.
///
/// Returns `None` if `raw` does not match `^\d+-\d+-\d+-\d+$`. A segment whose
/// numeric value needs more digits than its canonical width is not truncated —
/// the padded width only ever grows to fit the value.
pub fn canonicalize_bank_number(raw: &str) -> Option<String> {
    if !BANK_NUMBER_SHAPE.is_match(raw) {
        return None;
    }
    let parts: Vec<&str> = raw.split('-').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut groups = Vec::with_capacity(4);
    for (part, width) in parts.iter().zip(GROUP_WIDTHS) {
        let value: u64 = part.parse().ok()?;
        groups.push(format!("{:0width$}", value, width = width));
    }
    Some(groups.join("-"))
}

/// Normalize a display name for identity comparison: Unicode NFD, strip
/// combining marks (category Mn), lowercase, trim ASCII whitespace.
pub fn normalize_name(raw: &str) -> String {
    use unicode_normalization::char::is_combining_mark;
    use unicode_normalization::UnicodeNormalization;

    let stripped: String = raw.nfd().filter(|c| !is_combining_mark(*c)).collect();
    let lowered = stripped.to_lowercase();
    lowered
        .trim_matches(|c: char| c.is_ascii_whitespace())
        .to_string()
}

/// Sørensen–Dice coefficient over character bigrams of two (already comparable)
/// strings.
pub fn dice_coefficient(a: &str, b: &str) -> f64 {
    let bigrams = |s: &str| -> Vec<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() < 2 {
            return Vec::new();
        }
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    };
    let a_bigrams = bigrams(a);
    let b_bigrams = bigrams(b);

    if a_bigrams.is_empty() || b_bigrams.is_empty() {
        return if a == b { 1.0 } else { 0.0 };
    }

    let mut remaining = b_bigrams.clone();
    let mut matches = 0usize;
    for bg in &a_bigrams {
        if let Some(pos) = remaining.iter().position(|x| x == bg) {
            remaining.remove(pos);
            matches += 1;
        }
    }

    (2.0 * matches as f64) / (a_bigrams.len() + b_bigrams.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_pads_each_group() {
        assert_eq!(canonicalize_bank_number("1-2-3-4").unwrap(), "01-0002-0000003-004");
    }

    #[test]
    fn canonicalize_rejects_bad_shape() {
        assert_eq!(canonicalize_bank_number("12-34-56"), None);
        assert_eq!(canonicalize_bank_number("ab-12-34-56"), None);
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let once = canonicalize_bank_number("1-2-3-4").unwrap();
        let twice = canonicalize_bank_number(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn canonicalize_widens_overflowing_segments() {
        assert_eq!(canonicalize_bank_number("123-4-5-6").unwrap(), "123-0004-0000005-006");
    }

    #[test]
    fn normalize_strips_diacritics_and_case() {
        assert_eq!(normalize_name("  Café René  "), "cafe rene");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_name("Café René");
        let twice = normalize_name(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn dice_identical_strings_score_one() {
        assert_eq!(dice_coefficient("coffee", "coffee"), 1.0);
    }

    #[test]
    fn dice_disjoint_strings_score_zero() {
        assert_eq!(dice_coefficient("aaaa", "zzzz"), 0.0);
    }
}
