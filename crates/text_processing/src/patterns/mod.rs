//! Pattern Library
//!
//! Declarative regex rules for intents, entities, products, person names,
//! cities and digit sequences. Matching is a pure function of the normalized
//! text and the rule set: every rule is run independently and every match is
//! returned with its span and priority. Selection (best intent, overlap
//! resolution) is left to the [`Recognizer`](crate::Recognizer).
//!
//! Rule order matters: the registration index breaks priority ties.

mod tables;

use regex::Regex;
use serde::{Deserialize, Serialize};
use voice_support_core::{EntityKind, IntentTag, Span};

use crate::error::{Result, TextProcessingError};

/// What a matching rule yields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKind {
    Intent(IntentTag),
    Entity(EntityKind),
}

/// How the entity value is derived from the match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueSource {
    /// First capture group, or the whole match when there is none
    Capture,
    /// Capture with the first letter upper-cased (names, streets)
    Capitalized,
    /// Fixed canonical value (dictionary entries)
    Fixed(String),
}

/// Uncompiled rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub pattern: String,
    pub kind: MatchKind,
    pub value: ValueSource,
    /// Higher wins; more specific patterns carry higher priority
    pub priority: u32,
}

impl RuleSpec {
    pub fn intent(name: &str, pattern: &str, tag: IntentTag, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            kind: MatchKind::Intent(tag),
            value: ValueSource::Fixed(tag.as_str().to_string()),
            priority,
        }
    }

    pub fn entity(name: &str, pattern: &str, kind: EntityKind, value: ValueSource, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            kind: MatchKind::Entity(kind),
            value,
            priority,
        }
    }
}

/// Compiled rule with its regex
struct CompiledRule {
    index: usize,
    name: String,
    regex: Regex,
    kind: MatchKind,
    value: ValueSource,
    priority: u32,
}

/// One rule hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMatch {
    /// Registration index of the rule
    pub rule: usize,
    pub rule_name: String,
    pub kind: MatchKind,
    pub value: String,
    pub span: Span,
    pub priority: u32,
}

/// Immutable rule set, shared by reference across sessions
pub struct PatternLibrary {
    rules: Vec<CompiledRule>,
}

impl PatternLibrary {
    /// Built-in Russian rule set
    ///
    /// A rule that fails to compile is logged and skipped.
    pub fn builtin() -> Self {
        let mut library = Self { rules: Vec::new() };
        for spec in tables::builtin_rules() {
            if let Err(e) = library.register(spec) {
                tracing::warn!(error = %e, "Skipping built-in pattern");
            }
        }
        library
    }

    /// Compile a custom rule set. Any invalid pattern fails the whole set.
    pub fn from_specs(specs: Vec<RuleSpec>) -> Result<Self> {
        let mut library = Self { rules: Vec::new() };
        for spec in specs {
            library.register(spec)?;
        }
        Ok(library)
    }

    /// Append a rule; it gets the next registration index
    pub fn register(&mut self, spec: RuleSpec) -> Result<()> {
        let regex = Regex::new(&spec.pattern).map_err(|e| TextProcessingError::InvalidPattern {
            rule: spec.name.clone(),
            message: e.to_string(),
        })?;

        self.rules.push(CompiledRule {
            index: self.rules.len(),
            name: spec.name,
            regex,
            kind: spec.kind,
            value: spec.value,
            priority: spec.priority,
        });
        Ok(())
    }

    /// Run every rule over normalized `text`
    ///
    /// Output is ordered by span start, then by rule index, so identical
    /// input always yields identical output.
    pub fn match_all(&self, text: &str) -> Vec<PatternMatch> {
        let mut matches = Vec::new();
        if text.is_empty() {
            return matches;
        }

        for rule in &self.rules {
            for caps in rule.regex.captures_iter(text) {
                let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                    continue;
                };
                if m.as_str().is_empty() {
                    continue;
                }

                let value = match &rule.value {
                    ValueSource::Capture => m.as_str().to_string(),
                    ValueSource::Capitalized => capitalize(m.as_str()),
                    ValueSource::Fixed(v) => v.clone(),
                };

                matches.push(PatternMatch {
                    rule: rule.index,
                    rule_name: rule.name.clone(),
                    kind: rule.kind,
                    value,
                    span: Span::new(m.start(), m.end()),
                    priority: rule.priority,
                });
            }
        }

        matches.sort_by(|a, b| a.span.start.cmp(&b.span.start).then(a.rule.cmp(&b.rule)));
        matches
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule names in registration order
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(matches: &[PatternMatch]) -> Vec<MatchKind> {
        matches.iter().map(|m| m.kind).collect()
    }

    #[test]
    fn test_builtin_compiles_everything() {
        let library = PatternLibrary::builtin();
        assert_eq!(library.len(), tables::builtin_rules().len());
    }

    #[test]
    fn test_no_match() {
        let library = PatternLibrary::builtin();
        assert!(library.match_all("").is_empty());
        assert!(library.match_all("ммм эээ").is_empty());
    }

    #[test]
    fn test_multiple_kinds_in_one_utterance() {
        let library = PatternLibrary::builtin();
        let matches = library.match_all("где мой заказ 12345");

        let k = kinds(&matches);
        assert!(k.contains(&MatchKind::Intent(IntentTag::OrderStatus)));
        assert!(k.contains(&MatchKind::Entity(EntityKind::OrderNumber)));
        assert!(k.contains(&MatchKind::Entity(EntityKind::DigitSequence)));

        let order = matches
            .iter()
            .find(|m| m.kind == MatchKind::Entity(EntityKind::OrderNumber))
            .unwrap();
        assert_eq!(order.value, "12345");
        assert_eq!(&"где мой заказ 12345"[order.span.start..order.span.end], "12345");
    }

    #[test]
    fn test_all_digit_sequences_returned() {
        let library = PatternLibrary::builtin();
        let digits: Vec<_> = library
            .match_all("дом 5 квартира 12")
            .into_iter()
            .filter(|m| m.kind == MatchKind::Entity(EntityKind::DigitSequence))
            .map(|m| m.value)
            .collect();
        assert_eq!(digits, vec!["5", "12"]);
    }

    #[test]
    fn test_city_dictionary_canonical() {
        let library = PatternLibrary::builtin();
        let matches = library.match_all("доставка в москве");
        let city = matches
            .iter()
            .find(|m| m.kind == MatchKind::Entity(EntityKind::City))
            .unwrap();
        assert_eq!(city.value, "Москва");
    }

    #[test]
    fn test_deterministic() {
        let library = PatternLibrary::builtin();
        let text = "меня зовут анна, заказ №777123 в санкт-петербург курьером";
        assert_eq!(library.match_all(text), library.match_all(text));
    }

    #[test]
    fn test_invalid_custom_rule() {
        let specs = vec![RuleSpec::intent("broken", "(", IntentTag::Help, 10)];
        assert!(matches!(
            PatternLibrary::from_specs(specs),
            Err(TextProcessingError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_registration_index() {
        let library = PatternLibrary::from_specs(vec![
            RuleSpec::intent("a", r"\bпомощь\b", IntentTag::Help, 10),
            RuleSpec::intent("b", r"\bпомощь\b", IntentTag::Operator, 10),
        ])
        .unwrap();
        let matches = library.match_all("нужна помощь");
        assert_eq!(matches[0].rule, 0);
        assert_eq!(matches[1].rule, 1);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("анна"), "Анна");
        assert_eq!(capitalize(""), "");
    }
}
