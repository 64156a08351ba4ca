//! Recognizer
//!
//! Turns one transcript into an [`AnalysisResult`]: the single strongest
//! intent (or none) and every extracted entity. Never blocks, never fails;
//! an utterance with no matches is the ordinary "unrecognized" case.

use std::sync::Arc;

use voice_support_core::{
    AnalysisResult, Entity, EntityKind, Intent, IntentTag, Utterance,
};

use crate::normalize;
use crate::patterns::{MatchKind, PatternLibrary, PatternMatch};

/// Per-session recognizer over a shared pattern library
pub struct Recognizer {
    library: Arc<PatternLibrary>,
    last: AnalysisResult,
}

impl Recognizer {
    pub fn new(library: Arc<PatternLibrary>) -> Self {
        Self {
            library,
            last: AnalysisResult::default(),
        }
    }

    /// Analyze a raw transcript
    pub fn analyze(&mut self, transcript: &str) -> AnalysisResult {
        self.analyze_utterance(normalize::utterance(transcript))
    }

    /// Analyze an utterance that was already normalized
    pub fn analyze_utterance(&mut self, utterance: Utterance) -> AnalysisResult {
        let result = analyze_with(&self.library, utterance);

        tracing::debug!(
            intent = ?result.intent_tag(),
            entities = result.entities.len(),
            transcript = %result.utterance.normalized,
            "Utterance analyzed"
        );

        self.last = result.clone();
        result
    }

    pub fn has_intent(&self, tag: IntentTag) -> bool {
        self.last.has_intent(tag)
    }

    pub fn has_entity(&self, kind: EntityKind) -> bool {
        self.last.has_entity(kind)
    }

    pub fn has_product(&self) -> bool {
        self.last.has_entity(EntityKind::Product)
    }

    /// Most recent utterance (silence before the first turn)
    pub fn last_utterance(&self) -> &Utterance {
        &self.last.utterance
    }

    pub fn last_result(&self) -> &AnalysisResult {
        &self.last
    }
}

/// Pure analysis over a library
pub fn analyze_with(library: &PatternLibrary, utterance: Utterance) -> AnalysisResult {
    let matches = library.match_all(&utterance.normalized);

    AnalysisResult {
        intent: select_intent(&matches),
        entities: collect_entities(&matches),
        utterance,
    }
}

/// Highest priority wins; on equal priority the earlier-registered rule wins
fn select_intent(matches: &[PatternMatch]) -> Option<Intent> {
    matches
        .iter()
        .filter_map(|m| match m.kind {
            MatchKind::Intent(tag) => Some((tag, m)),
            MatchKind::Entity(_) => None,
        })
        .min_by(|(_, a), (_, b)| b.priority.cmp(&a.priority).then(a.rule.cmp(&b.rule)))
        .map(|(tag, m)| Intent {
            tag,
            strength: m.priority,
            rule: m.rule,
        })
}

/// All entities; where two hits of the same kind overlap the stronger one stays
fn collect_entities(matches: &[PatternMatch]) -> Vec<Entity> {
    let mut candidates: Vec<(&PatternMatch, EntityKind)> = matches
        .iter()
        .filter_map(|m| match m.kind {
            MatchKind::Entity(kind) => Some((m, kind)),
            MatchKind::Intent(_) => None,
        })
        .collect();

    candidates.sort_by(|(a, _), (b, _)| b.priority.cmp(&a.priority).then(a.rule.cmp(&b.rule)));

    let mut kept: Vec<Entity> = Vec::new();
    for (m, kind) in candidates {
        let overlaps = kept.iter().any(|e| {
            e.kind == kind && e.span.start < m.span.end && m.span.start < e.span.end
        });
        if !overlaps {
            kept.push(Entity {
                kind,
                value: m.value.clone(),
                span: m.span,
            });
        }
    }

    kept.sort_by(|a, b| a.span.cmp(&b.span).then(a.kind.as_str().cmp(b.kind.as_str())));
    kept
}
