//! Memory Extractor (C8)
//!
//! Mines preferences, facts, and context cues out of user turns via
//! deterministic regex families, then folds them into a
//! [`ConversationContext`], grounded on
//! `original_source/app/core/memory_manager.py`.

mod patterns;
mod summarizer;

pub use summarizer::memory_context_for_prompt;

use crate::context::{ConversationContext, FactType, KeyFact, Preference, Role};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

const CONTEXT_CLUE_STORE_THRESHOLD: f64 = 0.5;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("word regex compiles"));
static SENTENCE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+").expect("sentence split regex compiles"));

fn extract_keywords(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .filter(|w| w.len() > 2 && !patterns::STOP_WORDS.contains(w.as_str()))
        .take(10)
        .collect()
}

fn calculate_confidence(content: &str, is_preference: bool) -> f64 {
    let lower = content.to_lowercase();
    let mut confidence: f64 = 0.5;

    if patterns::EXPLICIT_CONFIDENCE_INDICATORS
        .iter()
        .any(|ind| lower.contains(ind))
    {
        confidence += 0.3;
    }
    if patterns::DEFINITIVE_CONFIDENCE_INDICATORS
        .iter()
        .any(|ind| lower.contains(ind))
    {
        confidence += 0.2;
    }
    confidence += if is_preference { 0.1 } else { 0.05 };

    confidence.min(1.0)
}

/// Stateless extractor over pre-compiled pattern families. Cheap to
/// construct; typically shared behind an `Arc` alongside the rest of the
/// router.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryExtractor;

impl MemoryExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_preferences(&self, message: &str, turn_number: u64) -> Vec<Preference> {
        let lower = message.to_lowercase();
        let mut out = Vec::new();
        for re in patterns::PREFERENCE_PATTERNS.iter() {
            for m in re.find_iter(&lower) {
                let content = m.as_str().to_string();
                out.push(Preference {
                    keywords: extract_keywords(&content),
                    confidence: calculate_confidence(&content, true),
                    timestamp: Utc::now(),
                    content,
                });
            }
        }
        let _ = turn_number;
        out
    }

    pub fn extract_facts(&self, message: &str, turn_number: u64) -> Vec<KeyFact> {
        let lower = message.to_lowercase();
        let mut out = Vec::new();
        for re in patterns::FACT_PATTERNS.iter() {
            for m in re.find_iter(&lower) {
                let content = m.as_str().to_string();
                out.push(KeyFact {
                    keywords: extract_keywords(&content),
                    confidence: calculate_confidence(&content, false),
                    timestamp: Utc::now(),
                    source_turn: turn_number,
                    fact_type: FactType::Fact,
                    content,
                });
            }
        }
        out
    }

    pub fn extract_context_clues(&self, message: &str, turn_number: u64) -> Vec<KeyFact> {
        let mut out = Vec::new();
        for sentence in SENTENCE_SPLIT_RE.split(message) {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            let lower = sentence.to_lowercase();
            let importance_score = patterns::IMPORTANCE_KEYWORDS
                .iter()
                .filter(|kw| lower.contains(*kw))
                .count();
            if importance_score == 0 {
                continue;
            }
            let confidence = (importance_score as f64 * 0.3).min(0.9);
            out.push(KeyFact {
                keywords: extract_keywords(sentence),
                confidence,
                timestamp: Utc::now(),
                source_turn: turn_number,
                fact_type: FactType::Context,
                content: sentence.to_string(),
            });
        }
        out
    }

    /// Mine the latest user turn and fold the result into `ctx`, refreshing
    /// `interaction_summary` and `memory_keywords`. A no-op if there is no
    /// user message yet.
    pub fn process_turn(&self, mut ctx: ConversationContext, turn_number: u64) -> ConversationContext {
        let Some(latest) = ctx.messages.iter().rev().find(|m| m.role == Role::User) else {
            return ctx;
        };
        let content = latest.content.clone();

        let preferences = self.extract_preferences(&content, turn_number);
        let facts = self.extract_facts(&content, turn_number);
        let clues = self.extract_context_clues(&content, turn_number);

        let mut all_keywords = Vec::new();
        for pref in &preferences {
            all_keywords.extend(pref.keywords.iter().cloned());
        }
        for fact in &facts {
            all_keywords.extend(fact.keywords.iter().cloned());
        }
        for clue in &clues {
            all_keywords.extend(clue.keywords.iter().cloned());
        }

        for pref in preferences {
            ctx.add_preference(pref);
        }
        for fact in facts {
            ctx.add_key_fact(fact);
        }
        for clue in clues {
            if clue.confidence > CONTEXT_CLUE_STORE_THRESHOLD {
                ctx.add_key_fact(clue);
            }
        }

        ctx.interaction_summary = summarizer::summarize_conversation(&ctx.messages);
        ctx.merge_keywords(all_keywords);
        ctx.memory_last_updated = Some(Utc::now());

        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Message;

    #[test]
    fn extracts_preference_from_explicit_statement() {
        let extractor = MemoryExtractor::new();
        let prefs = extractor.extract_preferences("I prefer dark mode in my editor", 1);
        assert!(!prefs.is_empty());
        assert!(prefs[0].confidence > 0.5);
    }

    #[test]
    fn extracts_fact_from_definitive_statement() {
        let extractor = MemoryExtractor::new();
        let facts = extractor.extract_facts("The capital of France is Paris", 1);
        assert!(!facts.is_empty());
    }

    #[test]
    fn context_clues_require_importance_keyword() {
        let extractor = MemoryExtractor::new();
        let clues = extractor.extract_context_clues("This is an important detail to remember.", 1);
        assert!(!clues.is_empty());
        assert!(clues[0].confidence > 0.0);
    }

    #[test]
    fn no_clues_without_importance_keywords() {
        let extractor = MemoryExtractor::new();
        let clues = extractor.extract_context_clues("The sky is blue today.", 1);
        assert!(clues.is_empty());
    }

    #[test]
    fn process_turn_is_noop_without_user_message() {
        let extractor = MemoryExtractor::new();
        let ctx = ConversationContext::new("c1".into());
        let result = extractor.process_turn(ctx.clone(), 1);
        assert_eq!(result.user_preferences.len(), ctx.user_preferences.len());
    }

    #[test]
    fn process_turn_updates_summary_and_keywords() {
        let extractor = MemoryExtractor::new();
        let mut ctx = ConversationContext::new("c1".into());
        ctx.messages
            .push(Message::new(Role::User, "I prefer concise answers. Remember that I work in finance."));
        let result = extractor.process_turn(ctx, 1);
        assert!(!result.interaction_summary.is_empty() || !result.memory_keywords.is_empty());
        assert!(result.memory_last_updated.is_some());
    }
}
