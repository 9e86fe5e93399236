//! Romanization of logographic names.
//!
//! Han characters become toneless pinyin syllables, one token each. Anything
//! without a romanization passes through literally, so this never fails.

use pinyin::ToPinyin;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Returns true if the text needs no transliteration.
#[must_use]
pub fn is_latin(text: &str) -> bool {
    text.is_ascii()
}

/// Romanizes `text` into a space-delimited form.
///
/// Each Han character is emitted as its own ASCII syllable surrounded by
/// spaces; `ü` folds to `u`, as Latin spellings do after accent stripping.
/// Runs of other characters (including whitespace) are copied unchanged so
/// mixed-script words stay intact. Polyphonic characters take their primary
/// reading, which keeps the output deterministic.
///
/// # Examples
///
/// ```
/// use player_registry::normalize::transliterate::romanize;
///
/// assert_eq!(romanize("李雷").split_whitespace().collect::<Vec<_>>(), ["li", "lei"]);
/// ```
#[must_use]
pub fn romanize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for ch in text.chars() {
        match ch.to_pinyin() {
            Some(syllable) => {
                out.push(' ');
                out.extend(syllable.plain().nfd().filter(|c| !is_combining_mark(*c)));
                out.push(' ');
            }
            None => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_is_latin() {
        assert!(is_latin("anna lee"));
        assert!(is_latin(""));
        assert!(!is_latin("李雷"));
        assert!(!is_latin("jos\u{e9}"));
    }

    #[test]
    fn test_romanize_han() {
        assert_eq!(tokens(&romanize("李雷")), vec!["li", "lei"]);
        assert_eq!(tokens(&romanize("王 小明")), vec!["wang", "xiao", "ming"]);
    }

    #[test]
    fn test_romanize_is_ascii_for_han() {
        assert!(romanize("张伟").is_ascii());
    }

    #[test]
    fn test_umlaut_syllables_fold_to_ascii() {
        assert_eq!(tokens(&romanize("吕钦")), vec!["lu", "qin"]);
        assert_eq!(tokens(&romanize("女")), vec!["nu"]);
        assert_eq!(tokens(&romanize("略")), vec!["lue"]);
    }

    #[test]
    fn test_every_romanizable_unified_ideograph_is_ascii() {
        let mut checked = 0usize;
        for ch in ('\u{4E00}'..='\u{9FFF}').filter(|c| c.to_pinyin().is_some()) {
            let out = romanize(&ch.to_string());
            assert!(out.is_ascii(), "{ch} romanized to {out:?}");
            checked += 1;
        }
        assert!(checked > 10_000, "only {checked} ideographs have readings");
    }

    #[test]
    fn test_romanize_passes_through_unknown_scripts() {
        // Cyrillic has no romanization table here; the literal survives.
        assert_eq!(romanize("иван"), "иван");
    }

    #[test]
    fn test_romanize_keeps_latin_runs_intact() {
        assert_eq!(tokens(&romanize("lee李")), vec!["lee", "li"]);
    }

    #[test]
    fn test_romanize_deterministic() {
        assert_eq!(romanize("丁立人"), romanize("丁立人"));
    }
}
