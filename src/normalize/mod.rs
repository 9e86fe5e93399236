//! Text normalization for player names.
//!
//! Turns a raw name as it appears in a source document into an ordered
//! sequence of tokens:
//! - trim surrounding whitespace
//! - lowercase
//! - canonical decomposition, combining marks dropped (`é` → `e`)
//! - romanization when the result is not pure ASCII
//! - commas stripped (ASCII, fullwidth `，` and ideographic `、`)
//! - split on whitespace, empty tokens discarded

pub mod transliterate;

use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Ordered, normalized tokens of one raw name.
///
/// May be empty when the raw name held nothing but whitespace and commas;
/// such names generate no blocking keys and never resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSequence(Vec<String>);

impl TokenSequence {
    /// Wraps already-normalized tokens.
    #[must_use]
    pub fn new(tokens: Vec<String>) -> Self {
        Self(tokens)
    }

    /// Returns the tokens in order.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the name produced no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the sequence, returning the tokens.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for TokenSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// Strips diacritics via canonical decomposition.
fn strip_accents(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

fn is_comma(c: char) -> bool {
    matches!(c, ',' | '\u{FF0C}' | '\u{3001}')
}

/// Produces the cleaned, single-string form of a raw name.
///
/// This is [`normalize`] before tokenization; whitespace is not collapsed.
///
/// # Examples
///
/// ```
/// use player_registry::normalize::clean_name;
///
/// assert_eq!(clean_name("  Nepomniachtchi, Ián "), "nepomniachtchi ian");
/// ```
#[must_use]
pub fn clean_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let mut cleaned = strip_accents(&lowered);
    if !transliterate::is_latin(&cleaned) {
        cleaned = transliterate::romanize(&cleaned);
    }
    cleaned.retain(|c| !is_comma(c));
    cleaned
}

/// Normalizes a raw name into tokens.
///
/// # Examples
///
/// ```
/// use player_registry::normalize::normalize;
///
/// let tokens = normalize("Carlsen, Magnus");
/// assert_eq!(tokens.tokens(), ["carlsen", "magnus"]);
/// assert!(normalize("   ").is_empty());
/// ```
#[must_use]
pub fn normalize(raw: &str) -> TokenSequence {
    TokenSequence(
        clean_name(raw)
            .split_whitespace()
            .map(str::to_string)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(raw: &str) -> Vec<String> {
        normalize(raw).into_vec()
    }

    #[test]
    fn test_lowercase_and_trim() {
        assert_eq!(toks("  Anna LEE  "), vec!["anna", "lee"]);
    }

    #[test]
    fn test_strip_diacritics() {
        assert_eq!(toks("José Raúl Capablanca"), vec!["jose", "raul", "capablanca"]);
        assert_eq!(toks("Łukasz"), vec!["łukasz"]);
        assert_eq!(toks("Hjörvar Grétarsson"), vec!["hjorvar", "gretarsson"]);
    }

    #[test]
    fn test_commas_are_removed() {
        assert_eq!(toks("Smith, John"), vec!["smith", "john"]);
        assert_eq!(toks("Smith,John"), vec!["smithjohn"]);
    }

    #[test]
    fn test_cjk_commas_are_removed() {
        assert_eq!(toks("李，雷"), vec!["li", "lei"]);
        assert_eq!(toks("李、雷"), vec!["li", "lei"]);
        assert_eq!(toks("Carlsen， Magnus"), vec!["carlsen", "magnus"]);
        assert_eq!(toks("Carlsen，Magnus"), toks("Carlsen,Magnus"));
    }

    #[test]
    fn test_other_punctuation_is_kept() {
        assert_eq!(toks("Smith J."), vec!["smith", "j."]);
    }

    #[test]
    fn test_whitespace_collapse() {
        assert_eq!(toks("anna\t \n lee"), vec!["anna", "lee"]);
    }

    #[test]
    fn test_empty_and_degenerate() {
        assert!(normalize("").is_empty());
        assert!(normalize("   ").is_empty());
        assert!(normalize(" , ,, ").is_empty());
    }

    #[test]
    fn test_han_is_romanized() {
        assert_eq!(toks("李雷"), vec!["li", "lei"]);
        assert_eq!(toks(" 李雷 "), toks("Li Lei"));
    }

    #[test]
    fn test_han_umlaut_matches_latin_spellings() {
        assert_eq!(toks("吕钦"), vec!["lu", "qin"]);
        assert_eq!(toks("吕钦"), toks("Lü Qin"));
        assert_eq!(toks("吕钦"), toks("Lu Qin"));
        assert!(toks("女").iter().all(|t| t.is_ascii()));
    }

    #[test]
    fn test_unknown_script_passes_through() {
        assert_eq!(toks("Иван Петров"), vec!["иван", "петров"]);
    }

    #[test]
    fn test_display_joins_with_space() {
        assert_eq!(normalize("Lee Anna").to_string(), "lee anna");
    }

    #[test]
    fn test_clean_name_keeps_spacing() {
        assert_eq!(clean_name("Lee,  Anna"), "lee  anna");
    }
}
