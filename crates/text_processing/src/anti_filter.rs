//! Anti-filter letter substitution
//!
//! Some synthesizers refuse or garble phrases containing words from their
//! spam lists ("оплата", "карта", "код"). Swapping one Cyrillic letter of such
//! a word for its Latin look-alike keeps the pronunciation and gets past the
//! naive letter-based filter. The pass is deterministic: same input, same output.

use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

/// Cyrillic -> Latin look-alikes
const HOMOGLYPHS: &[(char, char)] = &[
    ('о', 'o'),
    ('а', 'a'),
    ('е', 'e'),
    ('р', 'p'),
    ('с', 'c'),
    ('х', 'x'),
    ('у', 'y'),
    ('О', 'O'),
    ('А', 'A'),
    ('Е', 'E'),
    ('Р', 'P'),
    ('С', 'C'),
    ('Х', 'X'),
];

/// Substitution pass over plain prompt text
#[derive(Debug, Clone, Default)]
pub struct AntiFilter {
    words: HashSet<String>,
}

impl AntiFilter {
    /// Trigger words are matched case-insensitively on whole words
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Replace the first substitutable letter of every trigger word
    pub fn apply(&self, text: &str) -> String {
        if self.words.is_empty() {
            return text.to_string();
        }

        text.split_word_bounds()
            .map(|segment| {
                if self.words.contains(&segment.to_lowercase()) {
                    substitute_first(segment)
                } else {
                    segment.to_string()
                }
            })
            .collect()
    }
}

fn substitute_first(word: &str) -> String {
    let mut replaced = false;
    word.chars()
        .map(|c| {
            if replaced {
                return c;
            }
            match HOMOGLYPHS.iter().find(|(cyr, _)| *cyr == c) {
                Some((_, lat)) => {
                    replaced = true;
                    *lat
                }
                None => c,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_word_substituted() {
        let filter = AntiFilter::new(["оплата"]);
        let out = filter.apply("Ваша оплата прошла.");
        assert_ne!(out, "Ваша оплата прошла.");
        assert!(out.contains(&format!("{}плата", 'o')));
        assert!(out.starts_with("Ваша "));
        assert!(out.ends_with(" прошла."));
    }

    #[test]
    fn test_case_insensitive_and_whole_word() {
        let filter = AntiFilter::new(["карта"]);
        assert_eq!(filter.apply("Карта"), format!("К{}рта", 'a'));
        // "картами" is not the trigger word
        assert_eq!(filter.apply("картами"), "картами");
    }

    #[test]
    fn test_deterministic_and_noop_when_empty() {
        let filter = AntiFilter::new(["код"]);
        let text = "Назовите код из СМС, код важен";
        assert_eq!(filter.apply(text), filter.apply(text));
        assert_eq!(AntiFilter::default().apply(text), text);
    }
}
